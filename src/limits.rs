/// Largest HTTP request body accepted, in bytes.
pub const MAX_BODY_BYTES: usize = 64 * 1024;

/// Reservations a single room may hold at once.
pub const MAX_RESERVATIONS_PER_ROOM: usize = 100_000;

/// Longest store principal accepted, in bytes. The principal names the WAL file.
pub const MAX_PRINCIPAL_LEN: usize = 128;

/// Capacity of the group-commit channel feeding the WAL writer.
pub const WAL_CHANNEL_CAPACITY: usize = 4096;

/// Largest WAL payload replay will allocate for. Anything bigger is corruption.
pub const MAX_WAL_ENTRY_LEN: usize = 1 << 20;
