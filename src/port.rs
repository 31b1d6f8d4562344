/// Well-known TCP port a switch dials to reach its controller.
pub const OFP_CONTROLLER_PORT: u16 = 6633;

/// OpenFlow 1.0 port numbers. Reserved values live in the top of the 16 bit
/// space and never appear in a switch port map.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum PortNumber {
    /// Maximum number of physical switch ports
    Max,
    /// Send the packet out the input port.
    InPort,
    /// Submit the packet to the first flow table. This destination port can only be used in
    /// packet-out messages.
    Table,
    /// Forward using the non OpenFlow pipeline.
    Normal,
    /// Flood through all physical ports except the input port and ports configured NO_FLOOD.
    Flood,
    /// Flood through all physical ports except the input port.
    All,
    /// Send to controller
    Controller,
    /// Local OpenFlow "port"
    Local,
    /// Not associated with a physical port; also used as a wildcard in requests.
    Any,
    /// A regular port number
    Regular(u16),
}

impl ::core::convert::From<u16> for PortNumber {
    fn from(value: u16) -> Self {
        match value {
            0xff00 => PortNumber::Max,
            0xfff8 => PortNumber::InPort,
            0xfff9 => PortNumber::Table,
            0xfffa => PortNumber::Normal,
            0xfffb => PortNumber::Flood,
            0xfffc => PortNumber::All,
            0xfffd => PortNumber::Controller,
            0xfffe => PortNumber::Local,
            0xffff => PortNumber::Any,
            other => PortNumber::Regular(other),
        }
    }
}

impl ::core::convert::From<PortNumber> for u16 {
    fn from(value: PortNumber) -> Self {
        match value {
            PortNumber::Max => 0xff00,
            PortNumber::InPort => 0xfff8,
            PortNumber::Table => 0xfff9,
            PortNumber::Normal => 0xfffa,
            PortNumber::Flood => 0xfffb,
            PortNumber::All => 0xfffc,
            PortNumber::Controller => 0xfffd,
            PortNumber::Local => 0xfffe,
            PortNumber::Any => 0xffff,
            PortNumber::Regular(other) => other,
        }
    }
}

/// OpenFlow 1.3 port numbers, 32 bits wide.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum PortNumber13 {
    /// Maximum number of physical and logical switch ports
    Max,
    /// Send the packet out the input port.
    InPort,
    /// Submit the packet to the first flow table. This destination port can only be used in
    /// packet-out messages.
    Table,
    /// Forward using non OpenFlow pipeline.
    Normal,
    /// Flood using non OpenFlow pipeline.
    Flood,
    /// Flood through all standard ports except input port.
    All,
    /// Send to controller
    Controller,
    /// Local OpenFlow "port"
    Local,
    /// Special value used in some requests when no port is specified (i.e. wildcarded)
    Any,
    /// A regular port number
    Regular(u32),
}

impl ::core::convert::From<u32> for PortNumber13 {
    fn from(value: u32) -> Self {
        match value {
            0xffff_ff00 => PortNumber13::Max,
            0xffff_fff8 => PortNumber13::InPort,
            0xffff_fff9 => PortNumber13::Table,
            0xffff_fffa => PortNumber13::Normal,
            0xffff_fffb => PortNumber13::Flood,
            0xffff_fffc => PortNumber13::All,
            0xffff_fffd => PortNumber13::Controller,
            0xffff_fffe => PortNumber13::Local,
            0xffff_ffff => PortNumber13::Any,
            other => PortNumber13::Regular(other),
        }
    }
}

impl ::core::convert::From<PortNumber13> for u32 {
    fn from(value: PortNumber13) -> Self {
        match value {
            PortNumber13::Max => 0xffff_ff00,
            PortNumber13::InPort => 0xffff_fff8,
            PortNumber13::Table => 0xffff_fff9,
            PortNumber13::Normal => 0xffff_fffa,
            PortNumber13::Flood => 0xffff_fffb,
            PortNumber13::All => 0xffff_fffc,
            PortNumber13::Controller => 0xffff_fffd,
            PortNumber13::Local => 0xffff_fffe,
            PortNumber13::Any => 0xffff_ffff,
            PortNumber13::Regular(other) => other,
        }
    }
}
