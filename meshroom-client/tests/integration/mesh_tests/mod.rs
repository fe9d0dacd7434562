mod test_failed_attempt_is_reported;
mod test_inbound_attempts;
