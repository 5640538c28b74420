use crate::output::print_json;
use anyhow::Context;
use momsync_core::xml::{inbound, outbound};
use std::path::Path;

pub fn run(file: &Path, as_outbound: bool) -> anyhow::Result<()> {
    let xml = std::fs::read_to_string(file)
        .with_context(|| format!("cannot read {}", file.display()))?;
    let record = inbound::decode(&xml).with_context(|| format!("cannot decode {}", file.display()))?;

    if as_outbound {
        println!("{}", outbound::encode(&record)?);
    } else {
        print_json(&record)?;
    }
    Ok(())
}
