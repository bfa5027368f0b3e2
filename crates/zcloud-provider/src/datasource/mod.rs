//! Read-only data sources: filter, list all pages, hash an identity,
//! optionally dump the result to a JSON file.

pub mod bmc_instances;
pub mod ddos_ips;
pub mod disks;
pub mod eips;
pub mod images;
pub mod key_pairs;
pub mod security_groups;
pub mod subnets;
pub mod util;
pub mod vm_instances;
pub mod vpcs;
pub mod zga_accelerators;
pub mod zga_certificates;
