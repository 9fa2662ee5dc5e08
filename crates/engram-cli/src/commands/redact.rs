//! `engram redact` — secret gate check for arbitrary text.

use std::io::Read;

use serde_json::json;

use crate::cli::RedactArgs;

pub fn handle(args: &RedactArgs, json_out: bool) -> anyhow::Result<()> {
    let text = match &args.text {
        Some(text) => text.clone(),
        None => {
            let mut buffer = String::new();
            std::io::stdin().read_to_string(&mut buffer)?;
            buffer
        }
    };

    let contains = engram_redact::contains_secrets(&text);
    let redacted = engram_redact::redact_secrets(&text);

    if json_out {
        println!(
            "{}",
            serde_json::to_string_pretty(&json!({
                "contains_secrets": contains,
                "redacted": redacted,
            }))?
        );
    } else {
        print!("{redacted}");
        if !redacted.ends_with('\n') {
            println!();
        }
        if contains {
            eprintln!("secret material detected");
        }
    }
    if contains {
        std::process::exit(1);
    }
    Ok(())
}
