//! Typed ID definitions for CampusConnect records.

use crate::define_id;

define_id!(
    /// A student, organizer, or admin account.
    UserId,
    "usr"
);
define_id!(
    /// A campus event.
    EventId,
    "evt"
);
define_id!(
    /// A student's registration for an event.
    RegistrationId,
    "reg"
);
define_id!(
    /// A single-use password reset grant.
    PasswordResetId,
    "pwr"
);
define_id!(
    /// Correlates logs and error bodies for one HTTP request.
    RequestId,
    "req"
);

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_user_id_roundtrip() {
        let id = UserId::new();
        let parsed: UserId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
        assert!(id.to_string().starts_with("usr_"));
    }

    #[test]
    fn test_event_id_rejects_user_prefix() {
        let user = UserId::new().to_string();
        let err = user.parse::<EventId>().unwrap_err();
        assert!(err.is_prefix_error());
    }

    #[test]
    fn test_missing_separator() {
        let result: Result<EventId, _> = "evt01HV4Z2WQXKJNM8GPQY6VBKC3D".parse();
        assert!(matches!(result, Err(crate::IdError::MissingSeparator)));
    }

    #[test]
    fn test_empty() {
        let result: Result<RegistrationId, _> = "".parse();
        assert!(matches!(result, Err(crate::IdError::Empty)));
    }

    #[test]
    fn test_invalid_ulid() {
        let result: Result<UserId, _> = "usr_not-a-ulid".parse();
        assert!(matches!(result, Err(crate::IdError::InvalidUlid(_))));
    }

    #[test]
    fn test_json_is_plain_string() {
        let id = EventId::new();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{id}\""));
        let parsed: EventId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_ids_sort_by_creation() {
        let first = RegistrationId::new();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let second = RegistrationId::new();
        assert!(first < second);
    }

    #[test]
    fn test_prefixes_unique() {
        let prefixes = [
            UserId::PREFIX,
            EventId::PREFIX,
            RegistrationId::PREFIX,
            PasswordResetId::PREFIX,
            RequestId::PREFIX,
        ];
        let unique: std::collections::HashSet<_> = prefixes.iter().collect();
        assert_eq!(prefixes.len(), unique.len());
    }

    proptest! {
        #[test]
        fn arbitrary_strings_never_panic(s in ".{0,40}") {
            let _ = s.parse::<UserId>();
        }
    }
}
