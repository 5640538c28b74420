use crate::output::print_json;
use anyhow::Context;
use momsync_core::config::Config;
use momsync_core::model::{parse_offset, split_angle_times};
use momsync_core::repository::SqliteRepository;
use std::path::Path;

pub fn run(config_path: &Path, mom2_id: i64, list: &str, json: bool) -> anyhow::Result<()> {
    let config = Config::load(config_path).context("failed to load config")?;
    let repo = SqliteRepository::open(&config.repository.path).with_context(|| {
        format!(
            "cannot open execution repository {}",
            config.repository.path.display()
        )
    })?;
    set(&repo, mom2_id, list, json)
}

fn set(repo: &SqliteRepository, mom2_id: i64, list: &str, json: bool) -> anyhow::Result<()> {
    let tokens = split_angle_times(list);
    if let Some(bad) = tokens.iter().find(|t| parse_offset(t).is_none()) {
        anyhow::bail!("invalid angle time '{bad}' (expected +<seconds>)");
    }
    if !repo.set_angle_times(mom2_id, list)? {
        anyhow::bail!("no observation with mom2Id {mom2_id}");
    }
    let record = repo
        .get(mom2_id)?
        .with_context(|| format!("observation {mom2_id} vanished"))?;
    if record.angle_times.len() != record.beams.len() {
        tracing::warn!(
            mom2_id,
            angle_times = record.angle_times.len(),
            beams = record.beams.len(),
            "angle-time count differs from beam count"
        );
    }

    if json {
        return print_json(&record);
    }
    println!(
        "observation {mom2_id}: angle times [{}]",
        record.angle_times.join(",")
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use momsync_core::model::ObservationRecord;
    use momsync_core::repository::Repository;

    fn repo_with(id: i64) -> SqliteRepository {
        let repo = SqliteRepository::open_in_memory().unwrap();
        repo.store(&ObservationRecord {
            mom2_id: Some(id),
            ..Default::default()
        })
        .unwrap();
        repo
    }

    #[test]
    fn sets_angle_times_on_a_stored_observation() {
        let repo = repo_with(3);
        set(&repo, 3, "[+0,+600]", true).unwrap();
        assert_eq!(repo.get(3).unwrap().unwrap().angle_times, vec!["+0", "+600"]);
    }

    #[test]
    fn unknown_observation_is_an_error() {
        let repo = repo_with(3);
        let err = set(&repo, 4, "[+0]", false).unwrap_err();
        assert!(err.to_string().contains("mom2Id 4"));
    }

    #[test]
    fn malformed_offsets_are_refused() {
        let repo = repo_with(3);
        assert!(set(&repo, 3, "[+0,later]", false).is_err());
        assert!(repo.get(3).unwrap().unwrap().angle_times.is_empty());
    }
}
