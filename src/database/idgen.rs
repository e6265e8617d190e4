use snowflake::SnowflakeIdGenerator;
use std::sync::Mutex;
use std::time::{Duration, UNIX_EPOCH};

const SNOWFLAKE_EPOCH: u64 = 1669205840566;

static GENERATOR: once_cell::sync::OnceCell<Mutex<SnowflakeIdGenerator>> = once_cell::sync::OnceCell::new();

fn new() -> Mutex<SnowflakeIdGenerator> {
    let epoch = UNIX_EPOCH + Duration::from_millis(SNOWFLAKE_EPOCH);
    let machine_id = fastrand::i32(0..32);
    let node_id = fastrand::i32(0..32);
    Mutex::new(SnowflakeIdGenerator::with_epoch(machine_id, node_id, epoch))
}

pub fn next() -> i64 {
    GENERATOR.get_or_init(new).lock().unwrap().generate()
}

const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

fn random_suffix(len: usize) -> String {
    (0..len)
        .map(|_| CODE_ALPHABET[fastrand::usize(..CODE_ALPHABET.len())] as char)
        .collect()
}

/// Locally-unique order identifier attached to a purchase before the gateway
/// session is opened.
pub fn order_id() -> String {
    format!("ORD-{}-{}", next(), random_suffix(4))
}

/// Reward-code string. 10 characters over a 32-symbol alphabet; collisions are
/// practically negligible but the insert path still retries on a unique
/// violation.
pub fn reward_code() -> String {
    format!("REWARD-{}", random_suffix(10))
}
