pub const MAX_NAME_LEN: usize = 256;
pub const MAX_TEXT_LEN: usize = 4096;
pub const MAX_SERVICES_PER_RESERVATION: usize = 32;
/// Upper bound on a single reservation, in minutes (one full day).
pub const MAX_RESERVATION_MINUTES: i64 = 24 * 60;
pub const MAX_RESERVATIONS_PER_GROOMER_DAY: usize = 1_000;
pub const MAX_GROOMERS: usize = 100_000;
