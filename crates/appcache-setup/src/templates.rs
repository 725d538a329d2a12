use std::path::Path;

/// Generate the systemd oneshot unit that preloads directories at boot.
pub fn systemd_unit(binary_path: &Path, config_dir: &Path) -> String {
    format!(
        r"[Unit]
Description=AppCache-Lock - Preload and lock apps into RAM
After=local-fs.target

[Service]
Type=oneshot
ExecStart={binary} preload --config-dir {config_dir}
RemainAfterExit=yes
User=root
Environment=APPCACHE_LOG_JSON=true

[Install]
WantedBy=multi-user.target
",
        binary = binary_path.display(),
        config_dir = config_dir.display(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit() -> String {
        systemd_unit(
            Path::new("/usr/local/bin/appcache-lock"),
            Path::new("/etc/appcache-lock"),
        )
    }

    #[test]
    fn unit_is_oneshot_and_stays_active() {
        let unit = unit();
        assert!(unit.contains("Type=oneshot"));
        assert!(unit.contains("RemainAfterExit=yes"));
    }

    #[test]
    fn unit_runs_preload_with_config_dir() {
        assert!(unit().contains(
            "ExecStart=/usr/local/bin/appcache-lock preload --config-dir /etc/appcache-lock"
        ));
    }

    #[test]
    fn unit_is_wanted_by_multi_user() {
        assert!(unit().contains("WantedBy=multi-user.target"));
    }
}
