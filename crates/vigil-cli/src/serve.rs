//! Line-delimited JSON request loop.
//!
//! One request object per input line, one reply object per output line.
//! The `op` field selects the operation:
//!
//! | op | Fields | Result |
//! |----|--------|--------|
//! | `scan_input` | `prompt` | scan report (cached when seen before) |
//! | `scan_output` | `prompt`, `response` | scan report |
//! | `canary_add` | `prompt`, optional `always`, `length`, `header` | decorated prompt |
//! | `canary_check` | `text` (or `prompt`) | `true` if a canary is present |
//! | `canary_list` | | every issued canary token, oldest first |
//! | `cache_clear` | | `null` |
//! | `add_texts` | `texts`, optional `metadatas` | stored document ids |
//! | `settings` | | active configuration |
//!
//! Every reply carries `success` and `timestamp`; failures carry `error`
//! instead of `result`. A malformed line gets an error reply and the loop
//! keeps going.

use std::io::{BufRead, Write};

use anyhow::Context;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};
use vigil_core::{CanaryOptions, Metadata, Vigil};

#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum Request {
    ScanInput {
        prompt: String,
    },
    ScanOutput {
        prompt: String,
        response: String,
    },
    CanaryAdd {
        prompt: String,
        #[serde(default)]
        always: Option<bool>,
        #[serde(default)]
        length: Option<usize>,
        #[serde(default)]
        header: Option<String>,
    },
    CanaryCheck {
        #[serde(alias = "prompt")]
        text: String,
    },
    CanaryList,
    CacheClear,
    AddTexts {
        texts: Vec<String>,
        #[serde(default)]
        metadatas: Option<Vec<Metadata>>,
    },
    Settings,
}

#[derive(Debug, Serialize)]
struct Reply {
    success: bool,
    timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl Reply {
    fn ok(result: Value) -> Self {
        Self {
            success: true,
            timestamp: Utc::now().to_rfc3339(),
            result: Some(result),
            error: None,
        }
    }

    fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            timestamp: Utc::now().to_rfc3339(),
            result: None,
            error: Some(message.into()),
        }
    }
}

/// Reads requests from `input` until EOF, writing one reply per request.
///
/// # Errors
///
/// Only I/O failures on `output` end the loop early.
pub fn run<R: BufRead, W: Write>(vigil: &Vigil, input: R, mut output: W) -> anyhow::Result<()> {
    info!("Serving JSON requests on stdin");

    for line in input.lines() {
        let line = match line {
            Ok(line) => line,
            Err(err) => {
                warn!("Error reading input: {}", err);
                continue;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let reply = match serde_json::from_str::<Request>(&line) {
            Ok(request) => handle(vigil, request),
            Err(err) => Reply::err(format!("Invalid request: {}", err)),
        };

        let json = serde_json::to_string(&reply).context("failed to encode reply")?;
        writeln!(output, "{}", json).context("failed to write reply")?;
        output.flush().context("failed to flush reply")?;
    }

    info!("Input closed, shutting down");
    Ok(())
}

fn handle(vigil: &Vigil, request: Request) -> Reply {
    debug!("Handling request: {:?}", request);

    let result = match request {
        Request::ScanInput { prompt } => to_value(&vigil.scan_input(&prompt)),
        Request::ScanOutput { prompt, response } => {
            if response.trim().is_empty() {
                return Reply::err("Missing \"response\" field");
            }
            to_value(&vigil.scan_output(&prompt, &response))
        }
        Request::CanaryAdd {
            prompt,
            always,
            length,
            header,
        } => {
            let defaults = &vigil.config().canary;
            let options = CanaryOptions::default()
                .with_always(always.unwrap_or(defaults.always))
                .with_length(length.unwrap_or(defaults.length))
                .with_header(header.unwrap_or_else(|| defaults.header.clone()));
            vigil
                .add_canary_with(&prompt, &options)
                .map(Value::String)
                .map_err(|err| err.to_string())
        }
        Request::CanaryCheck { text } => Ok(Value::Bool(vigil.check_canary(&text))),
        Request::CanaryList => to_value(&vigil.canary_tokens()),
        Request::CacheClear => {
            vigil.clear_cache();
            Ok(Value::Null)
        }
        Request::AddTexts { texts, metadatas } => {
            let metadatas = metadatas.unwrap_or_else(|| vec![Metadata::new(); texts.len()]);
            vigil
                .add_reference_texts(&texts, &metadatas)
                .map_err(|err| err.to_string())
                .and_then(|added| to_value(&added))
        }
        Request::Settings => to_value(vigil.config()),
    };

    match result {
        Ok(value) => Reply::ok(value),
        Err(message) => Reply::err(message),
    }
}

fn to_value<T: Serialize>(value: &T) -> Result<Value, String> {
    serde_json::to_value(value).map_err(|err| err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use vigil_core::VigilConfig;

    fn serve(vigil: &Vigil, input: &str) -> Vec<Value> {
        let mut output = Vec::new();
        run(vigil, Cursor::new(input), &mut output).unwrap();
        String::from_utf8(output)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    fn vigil() -> Vigil {
        Vigil::from_config(VigilConfig::default()).unwrap()
    }

    #[test]
    fn test_scan_input_then_cached() {
        let vigil = vigil();
        let replies = serve(
            &vigil,
            "{\"op\":\"scan_input\",\"prompt\":\"hello\"}\n{\"op\":\"scan_input\",\"prompt\":\"hello\"}\n",
        );
        assert_eq!(replies.len(), 2);
        assert_eq!(replies[0]["result"]["cached"], false);
        assert_eq!(replies[1]["result"]["cached"], true);
        assert_eq!(replies[1]["result"]["status"], "success");
    }

    #[test]
    fn test_canary_round_trip() {
        let vigil = vigil();
        let replies = serve(&vigil, "{\"op\":\"canary_add\",\"prompt\":\"hi\",\"always\":true}\n");
        let decorated = replies[0]["result"].as_str().unwrap().to_string();

        let check = serde_json::json!({"op": "canary_check", "prompt": decorated}).to_string();
        let miss = r#"{"op":"canary_check","text":"nothing here"}"#;
        let replies = serve(&vigil, &format!("{}\n{}\n", check, miss));
        assert_eq!(replies[0]["result"], true);
        assert_eq!(replies[1]["result"], false);
    }

    #[test]
    fn test_canary_list_returns_history() {
        let vigil = vigil();
        let replies = serve(
            &vigil,
            "{\"op\":\"canary_list\"}\n{\"op\":\"canary_add\",\"prompt\":\"a\"}\n{\"op\":\"canary_add\",\"prompt\":\"b\"}\n{\"op\":\"canary_list\"}\n",
        );
        assert_eq!(replies[0]["result"], serde_json::json!([]));

        let tokens = replies[3]["result"].as_array().unwrap();
        assert_eq!(tokens.len(), 2);
        for (token, added) in tokens.iter().zip(&replies[1..3]) {
            let token = token.as_str().unwrap();
            assert_eq!(token.len(), 16);
            assert!(added["result"].as_str().unwrap().contains(token));
        }
    }

    #[test]
    fn test_invalid_canary_options_reported() {
        let vigil = vigil();
        let replies = serve(&vigil, "{\"op\":\"canary_add\",\"prompt\":\"hi\",\"length\":3}\n");
        assert_eq!(replies[0]["success"], false);
        assert!(replies[0]["error"].as_str().unwrap().contains("length"));
    }

    #[test]
    fn test_bad_lines_do_not_stop_loop() {
        let vigil = vigil();
        let replies = serve(
            &vigil,
            "not json\n\n{\"op\":\"unknown\"}\n{\"op\":\"cache_clear\"}\n",
        );
        assert_eq!(replies.len(), 3);
        assert_eq!(replies[0]["success"], false);
        assert_eq!(replies[1]["success"], false);
        assert_eq!(replies[2]["success"], true);
        assert!(replies[2]["result"].is_null());
    }

    #[test]
    fn test_scan_output_requires_response() {
        let vigil = vigil();
        let replies = serve(
            &vigil,
            "{\"op\":\"scan_output\",\"prompt\":\"hi\",\"response\":\"  \"}\n",
        );
        assert_eq!(replies[0]["success"], false);
    }

    #[test]
    fn test_add_texts_defaults_metadata() {
        let vigil = vigil();
        let replies = serve(&vigil, "{\"op\":\"add_texts\",\"texts\":[\"a\",\"b\"]}\n");
        assert_eq!(replies[0]["result"]["success"], true);
        assert_eq!(replies[0]["result"]["ids"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_settings() {
        let vigil = vigil();
        let replies = serve(&vigil, "{\"op\":\"settings\"}\n");
        assert_eq!(replies[0]["result"]["main"]["cache_max"], 100);
    }
}
