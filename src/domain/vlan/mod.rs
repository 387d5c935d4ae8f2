pub mod vlan_allocator;
