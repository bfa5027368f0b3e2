//! One reconciler per resource type.

pub mod bmc_instance;
pub mod ddos_ip;
pub mod ddos_ip_association;
pub mod disk;
pub mod disk_attachment;
pub mod eip;
pub mod eip_association;
pub mod image;
pub mod key_pair;
pub mod security_group;
pub mod security_group_attachment;
pub mod security_group_rule;
pub mod subnet;
pub mod subnet_attachment;
pub mod vm_instance;
pub mod vpc;
pub mod zga_accelerator;
pub mod zga_certificate;
pub mod zga_config;
