use deltawatch_core::ApplyResult;
use proptest::prelude::*;

proptest! {
    #[test]
    fn test_any_ack_byte_decodes(byte in any::<u8>()) {
        let expected = match byte {
            1 => ApplyResult::Success,
            2 => ApplyResult::SuccessRefreshBrowser,
            _ => ApplyResult::Failed,
        };
        prop_assert_eq!(ApplyResult::from_ack(Some(byte)), expected);
        prop_assert_eq!(expected.is_success(), byte == 1 || byte == 2);
    }
}

#[test]
fn test_missing_ack_is_failure() {
    assert_eq!(ApplyResult::from_ack(None), ApplyResult::Failed);
    assert!(!ApplyResult::from_ack(None).is_success());
}
