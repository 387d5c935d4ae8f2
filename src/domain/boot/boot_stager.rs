use std::fmt::Debug;
use std::fs;
use std::path::{Path, PathBuf};

use crate::domain::reservation::reservation::{BootSpec, Reservation};
use crate::error::{Error, Result};

/// Makes the boot images of a committed reservation visible to the boot server.
pub trait BootStager: Debug + Send + Sync {
    fn stage(&self, reservation: &Reservation) -> Result<()>;

    fn unstage(&self, reservation: &Reservation) -> Result<()>;
}

/// Does nothing. Used when boot files are managed elsewhere.
#[derive(Debug, Clone, Default)]
pub struct NullBootStager;

impl BootStager for NullBootStager {
    fn stage(&self, _reservation: &Reservation) -> Result<()> {
        Ok(())
    }

    fn unstage(&self, _reservation: &Reservation) -> Result<()> {
        Ok(())
    }
}

/// Copies kernel and initrd to `<tftp_root>/igor/<name>-kernel` and
/// `<tftp_root>/igor/<name>-initrd`. Profile boots need no files.
#[derive(Debug, Clone)]
pub struct TftpBootStager {
    tftp_root: PathBuf,
}

impl TftpBootStager {
    pub fn new(tftp_root: impl Into<PathBuf>) -> Self {
        TftpBootStager { tftp_root: tftp_root.into() }
    }

    pub fn kernel_path(&self, reservation: &Reservation) -> PathBuf {
        self.tftp_root.join("igor").join(format!("{}-kernel", reservation.name))
    }

    pub fn initrd_path(&self, reservation: &Reservation) -> PathBuf {
        self.tftp_root.join("igor").join(format!("{}-initrd", reservation.name))
    }

    fn copy(source: &Path, destination: &Path) -> Result<()> {
        fs::copy(source, destination)
            .map_err(|e| Error::BootStaging(format!("failed to copy {} to {}: {}", source.display(), destination.display(), e)))?;
        Ok(())
    }
}

impl BootStager for TftpBootStager {
    fn stage(&self, reservation: &Reservation) -> Result<()> {
        let BootSpec::KernelInitrd { kernel, initrd } = &reservation.boot else {
            return Ok(());
        };

        let directory = self.tftp_root.join("igor");
        fs::create_dir_all(&directory).map_err(|e| Error::BootStaging(format!("failed to create {}: {}", directory.display(), e)))?;

        let kernel_destination = self.kernel_path(reservation);
        Self::copy(kernel, &kernel_destination)?;

        if let Err(e) = Self::copy(initrd, &self.initrd_path(reservation)) {
            let _ = fs::remove_file(&kernel_destination);
            return Err(e);
        }

        log::info!("Staged boot files of reservation '{}' in {}.", reservation.name, directory.display());
        Ok(())
    }

    fn unstage(&self, reservation: &Reservation) -> Result<()> {
        if !matches!(reservation.boot, BootSpec::KernelInitrd { .. }) {
            return Ok(());
        }

        for path in [self.kernel_path(reservation), self.initrd_path(reservation)] {
            match fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    log::warn!("Boot file {} was already gone.", path.display());
                }
                Err(e) => return Err(Error::BootStaging(format!("failed to remove {}: {}", path.display(), e))),
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::reservation::reservation::ReservationId;
    use crate::domain::utils::id::{ReservationName, UserName};

    fn reservation(boot: BootSpec) -> Reservation {
        Reservation {
            id: ReservationId(1),
            name: ReservationName::new("alpha"),
            owner: UserName::new("alice"),
            start_time: 0,
            end_time: 60,
            vlan: 100,
            hosts: vec!["host1".to_string()],
            boot,
            kernel_args: String::new(),
        }
    }

    #[test]
    fn test_stage_and_unstage_kernel_initrd() {
        let source = tempfile::tempdir().unwrap();
        let tftp = tempfile::tempdir().unwrap();
        let kernel = source.path().join("vmlinuz");
        let initrd = source.path().join("initrd.img");
        fs::write(&kernel, b"kernel").unwrap();
        fs::write(&initrd, b"initrd").unwrap();

        let stager = TftpBootStager::new(tftp.path());
        let reservation = reservation(BootSpec::KernelInitrd { kernel, initrd });

        stager.stage(&reservation).unwrap();
        assert_eq!(fs::read(stager.kernel_path(&reservation)).unwrap(), b"kernel");
        assert_eq!(fs::read(stager.initrd_path(&reservation)).unwrap(), b"initrd");

        stager.unstage(&reservation).unwrap();
        assert!(!stager.kernel_path(&reservation).exists());
        assert!(!stager.initrd_path(&reservation).exists());
    }

    #[test]
    fn test_missing_initrd_leaves_nothing_behind() {
        let source = tempfile::tempdir().unwrap();
        let tftp = tempfile::tempdir().unwrap();
        let kernel = source.path().join("vmlinuz");
        fs::write(&kernel, b"kernel").unwrap();

        let stager = TftpBootStager::new(tftp.path());
        let reservation = reservation(BootSpec::KernelInitrd { kernel, initrd: source.path().join("missing") });

        assert!(matches!(stager.stage(&reservation), Err(Error::BootStaging(_))));
        assert!(!stager.kernel_path(&reservation).exists());
    }

    #[test]
    fn test_profile_boot_needs_no_files() {
        let tftp = tempfile::tempdir().unwrap();
        let stager = TftpBootStager::new(tftp.path());
        let reservation = reservation(BootSpec::Profile { name: "centos".to_string() });

        stager.stage(&reservation).unwrap();
        stager.unstage(&reservation).unwrap();
        assert!(!tftp.path().join("igor").exists());
    }
}
