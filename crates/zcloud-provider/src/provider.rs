//! The host-facing lookup table: resource-type name to handler, data-source
//! name to reader.

use crate::datasource as ds;
use crate::resources as rs;
use crate::schema::{DataSource, ResourceHandler};
use std::collections::HashMap;
use std::sync::Arc;

pub struct Provider {
    resources: HashMap<&'static str, Arc<dyn ResourceHandler>>,
    data_sources: HashMap<&'static str, Arc<dyn DataSource>>,
}

impl Provider {
    pub fn new() -> Self {
        let handlers: Vec<Arc<dyn ResourceHandler>> = vec![
            Arc::new(rs::bmc_instance::BmcInstance),
            Arc::new(rs::vm_instance::VmInstance),
            Arc::new(rs::disk::Disk),
            Arc::new(rs::disk_attachment::DiskAttachment),
            Arc::new(rs::image::Image),
            Arc::new(rs::key_pair::KeyPair),
            Arc::new(rs::vpc::Vpc),
            Arc::new(rs::subnet::Subnet),
            Arc::new(rs::subnet_attachment::SubnetAttachment),
            Arc::new(rs::eip::Eip),
            Arc::new(rs::eip_association::EipAssociation),
            Arc::new(rs::ddos_ip::DdosIp),
            Arc::new(rs::ddos_ip_association::DdosIpAssociation),
            Arc::new(rs::security_group::SecurityGroup),
            Arc::new(rs::security_group_rule::SecurityGroupRule),
            Arc::new(rs::security_group_attachment::SecurityGroupAttachment),
            Arc::new(rs::zga_accelerator::ZgaAccelerator),
            Arc::new(rs::zga_certificate::ZgaCertificate),
        ];
        let readers: Vec<Arc<dyn DataSource>> = vec![
            Arc::new(ds::bmc_instances::BmcInstances),
            Arc::new(ds::vm_instances::VmInstances),
            Arc::new(ds::disks::Disks),
            Arc::new(ds::images::Images),
            Arc::new(ds::key_pairs::KeyPairs),
            Arc::new(ds::vpcs::Vpcs),
            Arc::new(ds::subnets::Subnets),
            Arc::new(ds::eips::Eips),
            Arc::new(ds::ddos_ips::DdosIps),
            Arc::new(ds::security_groups::SecurityGroups),
            Arc::new(ds::zga_accelerators::ZgaAccelerators),
            Arc::new(ds::zga_certificates::ZgaCertificates),
        ];
        Self {
            resources: handlers.into_iter().map(|h| (h.type_name(), h)).collect(),
            data_sources: readers.into_iter().map(|r| (r.type_name(), r)).collect(),
        }
    }

    pub fn resource(&self, type_name: &str) -> Option<&Arc<dyn ResourceHandler>> {
        self.resources.get(type_name)
    }

    pub fn data_source(&self, type_name: &str) -> Option<&Arc<dyn DataSource>> {
        self.data_sources.get(type_name)
    }

    pub fn resource_names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.resources.keys().copied().collect();
        names.sort_unstable();
        names
    }

    pub fn data_source_names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.data_sources.keys().copied().collect();
        names.sort_unstable();
        names
    }
}

impl Default for Provider {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_type_name_resolves() {
        let provider = Provider::new();
        assert_eq!(provider.resource_names().len(), 18);
        assert_eq!(provider.data_source_names().len(), 12);
        for name in provider.resource_names() {
            assert_eq!(provider.resource(name).unwrap().type_name(), name);
        }
        for name in provider.data_source_names() {
            assert_eq!(provider.data_source(name).unwrap().type_name(), name);
        }
    }

    #[test]
    fn names_carry_the_provider_prefix() {
        let provider = Provider::new();
        for name in provider.resource_names() {
            assert!(name.starts_with("zcloud_"), "{name}");
        }
    }
}
