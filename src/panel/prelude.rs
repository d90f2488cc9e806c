use crate::driver::modbus::prelude::*;

/// multimeter channels the board can hold
pub const MAX_CHANNELS: usize = 8;

/// registers per multimeter channel: status, kind/flags, value low, value high
pub const REGS_PER_CHANNEL: ModbusAddrSize = 4;

// register map of the resource handler
pub const ADDR_IDENTITY: ModbusAddrSize = 0x000;
pub const IDENTITY_REGS: ModbusAddrSize = 3;
pub const ADDR_DOUTS: ModbusAddrSize = 0x200;
pub const ADDR_RELAYS: ModbusAddrSize = 0x300;
pub const ADDR_CHANNELS: ModbusAddrSize = 0x400;

/// highest relay mask accepted from the host
pub const MAX_RELAY_MASK: i64 = 256;
