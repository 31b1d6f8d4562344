pub mod actions;
pub mod error;
pub mod features_reply;
pub mod flow_mod;
pub mod flow_removed;
pub mod group_mod;
pub mod hello;
pub mod instructions;
pub mod multipart;
pub mod openflow;
pub mod packet_in;
pub mod packet_out;
pub mod phy_port;
pub mod port_mod;
pub mod port_status;
pub mod stats;
pub mod switch_config;
