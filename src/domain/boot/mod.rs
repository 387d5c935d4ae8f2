pub mod boot_stager;
