use std::{
    collections::HashMap,
    env,
    time::{SystemTime, UNIX_EPOCH},
};

use super::*;

#[test]
fn defaults_match_queue_presets() {
    let settings = SyncSettings::default();
    assert_eq!(settings.page_size, 50);
    assert!(settings.hydrate_fetched_pages);
    assert_eq!(settings.message_queue.to_config(), LoadQueueConfig::MESSAGES);
    assert_eq!(settings.guild_queue.to_config(), LoadQueueConfig::GUILDS);
    assert_eq!(settings.typing_interval(), Duration::from_secs(8));
}

#[test]
fn partial_file_keeps_defaults_for_missing_keys() {
    let suffix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock")
        .as_nanos();
    let path = env::temp_dir().join(format!("client_core_settings_{suffix}.toml"));
    fs::write(
        &path,
        "page_size = 25\n\n[message_queue]\nmax_concurrency = 2\n",
    )
    .expect("write settings");

    let settings = load_settings(Some(path.as_path())).expect("load settings");
    fs::remove_file(&path).expect("cleanup");

    assert_eq!(settings.page_size, 25);
    assert_eq!(settings.message_queue.max_concurrency, 2);
    assert_eq!(settings.message_queue.batch_size, 20);
    assert_eq!(settings.guild_queue, SyncSettings::default().guild_queue);
}

#[test]
fn missing_file_is_an_error() {
    let path = env::temp_dir().join("client_core_settings_does_not_exist.toml");
    assert!(load_settings(Some(path.as_path())).is_err());
}

#[test]
fn env_overrides_apply_and_bad_values_are_ignored() {
    let vars: HashMap<&str, &str> = HashMap::from([
        ("APP__PAGE_SIZE", "80"),
        ("APP__HYDRATE_FETCHED_PAGES", "false"),
        ("APP__GUILD_MAX_CONCURRENCY", "lots"),
        ("APP__MESSAGE_BATCH_SIZE", " 40 "),
    ]);
    let mut settings = SyncSettings::default();
    apply_env_overrides(&mut settings, |key| vars.get(key).map(|v| v.to_string()));

    assert_eq!(settings.page_size, 80);
    assert!(!settings.hydrate_fetched_pages);
    assert_eq!(settings.message_queue.batch_size, 40);
    assert_eq!(settings.guild_queue.max_concurrency, 3);
}

#[test]
fn zero_sizes_are_lifted_to_one() {
    let queue = QueueSettings {
        batch_size: 0,
        max_concurrency: 0,
        min_interval_ms: 0,
        cooldown_ms: 0,
    };
    let config = queue.to_config();
    assert_eq!(config.batch_size, 1);
    assert_eq!(config.max_concurrency, 1);
}

#[test]
fn partial_queue_tables_layer_onto_their_own_preset() {
    let settings: SyncSettings = toml::from_str(
        "[guild_queue]\nbatch_size = 4\n\n[message_queue]\ncooldown_ms = 75\n",
    )
    .expect("parse settings");

    let guilds = settings.guild_queue.to_config();
    assert_eq!(guilds.batch_size, 4);
    assert_eq!(guilds.max_concurrency, 3);
    assert_eq!(settings.guild_queue.min_interval_ms, 0);
    assert_eq!(guilds.cooldown, Duration::from_millis(100));

    let messages = settings.message_queue.to_config();
    assert_eq!(messages.batch_size, 20);
    assert_eq!(messages.max_concurrency, 5);
    assert_eq!(messages.min_interval, Duration::from_millis(100));
    assert_eq!(messages.cooldown, Duration::from_millis(75));
}
