use serde_json::{json, Value};

const CHAT_INPUT: u8 = 1;

const STRING: u8 = 3;
const INTEGER: u8 = 4;
const BOOLEAN: u8 = 5;

fn option(name: &str, de_name: &str, description: &str, de_description: &str, kind: u8) -> Value {
    json!({
        "name": name,
        "name_localizations": { "de": de_name },
        "description": description,
        "description_localizations": { "de": de_description },
        "type": kind,
        "required": false
    })
}

fn required(mut option: Value) -> Value {
    option["required"] = json!(true);
    option
}

fn choice(name: &str, de_name: &str, value: &str) -> Value {
    json!({
        "name": name,
        "name_localizations": { "de": de_name },
        "value": value
    })
}

fn with_choices(mut option: Value, choices: Vec<Value>) -> Value {
    option["choices"] = Value::Array(choices);
    option
}

fn command(
    name: &str,
    de_name: &str,
    description: &str,
    de_description: &str,
    options: Vec<Value>,
) -> Value {
    json!({
        "name": name,
        "name_localizations": { "de": de_name },
        "description": description,
        "description_localizations": { "de": de_description },
        "type": CHAT_INPUT,
        "options": options
    })
}

fn unit_option(description: &str) -> Value {
    with_choices(
        option(
            "unit",
            "einheit",
            description,
            "Welche Einheit soll für die Dauer genutzt werden",
            STRING,
        ),
        vec![
            choice("Minutes", "Minuten", "minutes"),
            choice("Seconds", "Sekunden", "seconds"),
        ],
    )
}

fn id_option(description: &str, de_description: &str) -> Value {
    option("id", "id", description, de_description, STRING)
}

/// Body for the bulk command registration
pub fn slash_commands() -> Value {
    json!([
        command(
            "getpoll",
            "umfrageabrufen",
            "Get information about the most recent poll in the authorized Twitch channel",
            "Informationen über die letzte Umfrage des authorisierten Twitch-Kanals abrufen",
            vec![id_option(
                "ID of the poll (Default: the most recent one)",
                "ID der Umfrage (Standardmäßig die letzte)",
            )],
        ),
        command(
            "poll",
            "umfrage",
            "Create a poll in the authorized Twitch channel",
            "Eine Umfrage im authorisierten Twitch-Kanal erstellen",
            vec![
                required(option(
                    "title",
                    "frage",
                    "Title displayed in the poll",
                    "Der Titel, der in der Umfrage angezeigt werden soll",
                    STRING,
                )),
                required(option(
                    "choices",
                    "antworten",
                    "List of the poll choices (separated by semicolon)",
                    "Eine Liste an Antwortmöglichkeiten (getrennt durch Strichpunkte/Semikolon)",
                    STRING,
                )),
                required(option(
                    "duration",
                    "dauer",
                    "Total duration for the poll (Default: in seconds).",
                    "Gesamtdauer der Umfrage (Standardmäßig in Sekunden)",
                    INTEGER,
                )),
                unit_option("Which unit to use for the duration"),
                option(
                    "channelpoints",
                    "kanalpunkte",
                    "Indicates if Channel Points can be used for voting",
                    "Gibt an, ob Kanalpunkte für die Abstimmung verwendet werden können",
                    BOOLEAN,
                ),
                option(
                    "cpnumber",
                    "kpanzahl",
                    "Number of Channel Points required to vote once with Channel Points.",
                    "Anzahl der Kanalpunkte, die für eine Stimme mit Kanalpunkten benötigt wird",
                    INTEGER,
                ),
            ],
        ),
        command(
            "endpoll",
            "umfragebeenden",
            "End the poll that is currently active",
            "Die Umfrage, die aktuell läuft, beenden",
            vec![
                required(with_choices(
                    option(
                        "status",
                        "status",
                        "The poll status to be set",
                        "Der Status, auf den die Umfrage gesetzt werden soll",
                        STRING,
                    ),
                    vec![
                        choice(
                            "Terminated (End the poll manually, but allow it to be viewed publicly)",
                            "Beendet (Umfrage manuell beenden, aber öffentlich sichtbar lassen)",
                            "TERMINATED",
                        ),
                        choice(
                            "Archived (End the poll manually and do not allow it to be viewed publicly)",
                            "Archiviert (Umfrage manuell beenden und auf privat stellen)",
                            "ARCHIVED",
                        ),
                    ],
                )),
                id_option(
                    "ID of the poll (Default: the most recent one)",
                    "ID der Umfrage (Standardmäßig die letzte)",
                ),
            ],
        ),
        command(
            "getprediction",
            "vorhersageabrufen",
            "Get information about the most recent prediction in the authorized Twitch channel",
            "Informationen über die letzte Vorhersage des authorisierten Twitch-Kanals abrufen",
            vec![id_option(
                "ID of the prediction (Default: the most recent one)",
                "ID der Vorhersage (Standardmäßig die letzte)",
            )],
        ),
        command(
            "prediction",
            "vorhersage",
            "Create a prediction in the authorized Twitch channel",
            "Eine Vorhersage im authorisierten Twitch-Kanal erstellen",
            vec![
                required(option(
                    "title",
                    "titel",
                    "Title for the prediction",
                    "Titel für die Vorhersage",
                    STRING,
                )),
                required(option(
                    "outcomes",
                    "ergebnisse",
                    "List of the outcomes (separated by semicolon)",
                    "Liste der möglichen Ergebnisse (getrennt durch Strichpunkte/Semikolon)",
                    STRING,
                )),
                required(option(
                    "duration",
                    "dauer",
                    "Total duration for the prediction (Default: in seconds)",
                    "Gesamtdauer der Vorhersage (Standardmäßig in Sekunden)",
                    INTEGER,
                )),
                unit_option("Which unit to use for duration"),
            ],
        ),
        command(
            "endprediction",
            "vorhersagebeeenden",
            "Lock, resolve, or cancel a prediction",
            "Eine Vorhersage sperren, auflösen oder abbrechen",
            vec![
                required(with_choices(
                    option(
                        "status",
                        "status",
                        "The prediction status to be set",
                        "Der Status, auf den die Vorhersage gesetzt werden soll",
                        STRING,
                    ),
                    vec![
                        choice(
                            "Resolved (A winning outcome has been chosen and the Channel Points have been distributed)",
                            "Aufgelöst (Ein Gewinner wurde ausgewählt und die Kanalpunkte wurden verteilt)",
                            "RESOLVED",
                        ),
                        choice(
                            "Canceled (The prediction has been canceled and the Channel Points have been refunded)",
                            "Abgebrochen (Die Vorhersage wurde abgebrochen und die Kanalpunkte wurden zurückerstattet)",
                            "CANCELED",
                        ),
                        choice(
                            "Locked (The prediction has been locked and viewers can no longer make predictions)",
                            "Gesperrt (Die Vorhersage wurde gesperrt und Zuschauer können nicht länger vorhersagen)",
                            "LOCKED",
                        ),
                    ],
                )),
                option(
                    "winning_outcome_id",
                    "gewinnendes_ergebnis_id",
                    "ID of the winning outcome for the prediction (Required if status is \"Resolved\")",
                    "ID des Ergebnisses, welches die Vorhersage gewinnen soll (Erforderlich, wenn status \"Aufgelöst\" ist)",
                    STRING,
                ),
                id_option(
                    "ID of the prediction (Default: the most recent one)",
                    "ID der Vorhersage (Standardmäßig die letzte)",
                ),
            ],
        ),
    ])
}
