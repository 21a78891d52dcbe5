//! Key and channel name builders for the `tgsentinel:` keyspace (spec §6.1).
//! Centralized here so a typo in a key name is a compile error at the call
//! site, not a runtime desync between writer and reader.

pub const MESSAGES_STREAM: &str = "tgsentinel:messages";
pub const WORKER_STATUS: &str = "tgsentinel:worker_status";
pub const USER_INFO: &str = "tgsentinel:user_info";
pub const BATCH_PROCESSOR_QUEUE: &str = "tgsentinel:batch_processor:queue";
pub const BATCH_PROCESSOR_LAST_BATCH_TIME: &str = "tgsentinel:batch_processor:last_batch_time";
pub const RELOGIN_HANDSHAKE: &str = "tgsentinel:relogin:handshake";
pub const AUTH_QUEUE: &str = "tgsentinel:auth_queue";
pub const AUTH_RESPONSES: &str = "tgsentinel:auth_responses";
pub const LOGIN_PROGRESS: &str = "tgsentinel:login_progress";
pub const LOGOUT_PROGRESS: &str = "tgsentinel:logout_progress";
pub const DIGEST_EXECUTIONS_HISTORY: &str = "tgsentinel:digest:executions:history";

pub const CHANNEL_SESSION_UPDATED: &str = "tgsentinel:session_updated";
pub const CHANNEL_CONFIG_UPDATED: &str = "tgsentinel:config_updated";
pub const CHANNEL_CACHE_READY: &str = "tgsentinel:cache_ready_event";

pub fn cached_channels(generation: u64) -> String {
    format!("tgsentinel:{generation}:cached_channels")
}

pub fn cached_users(generation: u64) -> String {
    format!("tgsentinel:{generation}:cached_users")
}

pub fn avatar(prefix: &str, id: i64) -> String {
    format!("tgsentinel:{prefix}_avatar:{id}")
}

pub fn digest_last_run(schedule: &str) -> String {
    format!("tgsentinel:digest:last_run:{schedule}")
}

pub fn digest_executions(profile_id: &str) -> String {
    format!("tgsentinel:digest:executions:{profile_id}")
}

pub fn digest_executions_latest(profile_id: &str) -> String {
    format!("tgsentinel:digest:executions:latest:{profile_id}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generation_scoped_cache_keys() {
        assert_eq!(cached_channels(3), "tgsentinel:3:cached_channels");
        assert_eq!(cached_users(3), "tgsentinel:3:cached_users");
    }

    #[test]
    fn avatar_key_uses_prefix() {
        assert_eq!(avatar("channel", 42), "tgsentinel:channel_avatar:42");
        assert_eq!(avatar("user", 7), "tgsentinel:user_avatar:7");
    }

    #[test]
    fn digest_keys_are_scoped_by_profile_or_schedule() {
        assert_eq!(digest_last_run("hourly"), "tgsentinel:digest:last_run:hourly");
        assert_eq!(
            digest_executions("standup"),
            "tgsentinel:digest:executions:standup"
        );
        assert_eq!(
            digest_executions_latest("standup"),
            "tgsentinel:digest:executions:latest:standup"
        );
    }
}
