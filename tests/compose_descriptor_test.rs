use fit_check::config::compose::{ComposeFile, DescriptorIssue, MountSource, RestartPolicy};
use fit_check::utils::validation::Validate;
use std::io::Write;
use tempfile::TempDir;

const DESCRIPTOR: &str = include_str!("../docker-compose.yml");

fn shipped() -> ComposeFile {
    ComposeFile::from_yaml_str(DESCRIPTOR).unwrap()
}

#[test]
fn test_shipped_descriptor_declares_app_and_mongo() {
    let compose = shipped();

    assert_eq!(
        compose.services.keys().collect::<Vec<_>>(),
        vec!["app", "mongo"]
    );

    let app = compose.service("app").unwrap();
    assert_eq!(app.build.as_ref().unwrap().context(), ".");
    assert_eq!(app.env_file, vec![".env".to_string()]);
    assert_eq!(app.depends_on[0].service, "mongo");
    assert_eq!(app.restart, Some(RestartPolicy::Always));

    let mongo = compose.service("mongo").unwrap();
    assert!(mongo.image.as_deref().unwrap().starts_with("mongo"));
    assert_eq!(mongo.volumes[0].source, MountSource::Named("mongo_data".to_string()));
    assert_eq!(mongo.volumes[0].target, "/data/db");
    assert!(compose.volumes.contains_key("mongo_data"));
}

#[test]
fn test_shipped_descriptor_round_trips() {
    let compose = shipped();
    let yaml = compose.to_yaml_string().unwrap();
    let again = ComposeFile::from_yaml_str(&yaml).unwrap();
    assert_eq!(again, compose);
}

#[test]
fn test_shipped_descriptor_is_structurally_valid() {
    let compose = shipped();
    assert_eq!(compose.check(), Vec::new());
    assert!(compose.validate().is_ok());
}

#[test]
fn test_shipped_ports_are_valid_and_distinct() {
    let compose = shipped();
    let ports = compose.published_ports();

    let mut host_ports: Vec<(&str, u16)> = ports
        .iter()
        .map(|(service, mapping)| (*service, mapping.host.unwrap().start))
        .collect();
    host_ports.sort();
    assert_eq!(host_ports, vec![("app", 8000), ("mongo", 27017)]);

    for (i, (_, a)) in ports.iter().enumerate() {
        for (_, b) in &ports[i + 1..] {
            assert!(!a.conflicts_with(b));
        }
    }
}

#[test]
fn test_database_starts_before_app() {
    assert_eq!(shipped().startup_order().unwrap(), vec!["mongo", "app"]);
}

#[test]
fn test_missing_env_file_reported_for_app_only() {
    let dir = TempDir::new().unwrap();
    let issues = shipped().check_env_files(dir.path());

    assert_eq!(
        issues,
        vec![DescriptorIssue::MissingEnvFile {
            service: "app".to_string(),
            path: ".env".to_string()
        }]
    );
    assert!(issues.iter().all(DescriptorIssue::is_env_file));
    assert!(!DescriptorIssue::SelfDependency {
        service: "app".to_string()
    }
    .is_env_file());

    std::fs::File::create(dir.path().join(".env"))
        .unwrap()
        .write_all(b"MONGO_URI=mongodb://mongo:27017\n")
        .unwrap();
    assert!(shipped().check_env_files(dir.path()).is_empty());
}

#[test]
fn test_dangling_references_fail_validation() {
    let broken = DESCRIPTOR
        .replace("- mongo\n", "- database\n")
        .replace("mongo_data:/data/db", "db_data:/data/db");
    let compose = ComposeFile::from_yaml_str(&broken).unwrap();
    let issues = compose.check();

    assert!(issues.contains(&DescriptorIssue::UnknownDependency {
        service: "app".to_string(),
        dependency: "database".to_string()
    }));
    assert!(issues.contains(&DescriptorIssue::UnknownVolume {
        service: "mongo".to_string(),
        volume: "db_data".to_string()
    }));

    let err = compose.validate().unwrap_err();
    assert!(err.to_string().contains("database"));
}

#[test]
fn test_conflicting_host_port_is_reported() {
    let clashing = DESCRIPTOR.replace("\"27017:27017\"", "\"8000:27017\"");
    let issues = ComposeFile::from_yaml_str(&clashing).unwrap().check();

    assert_eq!(
        issues,
        vec![DescriptorIssue::PortConflict {
            port: "8000".to_string(),
            first: "app".to_string(),
            second: "mongo".to_string()
        }]
    );
}

#[test]
fn test_from_file_reads_descriptor() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("docker-compose.yml");
    std::fs::write(&path, DESCRIPTOR).unwrap();

    assert_eq!(ComposeFile::from_file(&path).unwrap(), shipped());
    assert!(ComposeFile::from_file(dir.path().join("missing.yml")).is_err());
}

#[test]
fn test_malformed_yaml_is_an_error() {
    assert!(ComposeFile::from_yaml_str("services: [unclosed").is_err());
    assert!(ComposeFile::from_yaml_str("services:\n  app:\n    ports: [\"99999:80\"]\n").is_err());
}

#[test]
fn test_app_image_build_copies_lockfile() {
    let dockerfile = include_str!("../Dockerfile");
    let copy = dockerfile
        .lines()
        .find(|line| line.starts_with("COPY Cargo.toml"))
        .unwrap();
    assert!(copy.contains("Cargo.lock"), "{}", copy);
    assert_eq!(shipped().service("app").unwrap().build.as_ref().unwrap().context(), ".");
}
