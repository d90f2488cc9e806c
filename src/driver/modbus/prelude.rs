pub type ModbusUnitSize = u8;
pub type ModbusAddrSize = u16;
pub type ModbusValueSize = u16;
