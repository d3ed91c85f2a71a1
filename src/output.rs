//! Result presentation for analysis commands.
//!
//! With `--json`, every result is printed to stdout as an
//! [`Outcome`] envelope, failures included; otherwise the human renderer
//! runs on success and errors propagate to `main`.

use anyhow::Result;
use serde::Serialize;

use component_atlas_core::Outcome;

pub fn emit<T: Serialize>(json: bool, result: Result<T>, human: impl FnOnce(&T)) -> Result<()> {
    if !json {
        let data = result?;
        human(&data);
        return Ok(());
    }

    match result {
        Ok(data) => {
            println!("{}", serde_json::to_string_pretty(&Outcome::success(data))?);
            Ok(())
        }
        Err(e) => {
            let outcome: Outcome<()> = Outcome::failure(format!("{:#}", e));
            println!("{}", serde_json::to_string_pretty(&outcome)?);
            Err(e)
        }
    }
}
