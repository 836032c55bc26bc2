use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{bail, Context};

pub const MAX_COLLECTED: f64 = 10.0;
pub const MAX_MIDTERM: f64 = 20.0;
pub const MAX_FINAL: f64 = 20.0;
pub const COLLECTED_SLOTS: usize = 6;

pub const DEFAULT_MOCK_PATH: &str = "gradebook_data_v3.json";
pub const DEFAULT_TEACHER_PASSWORD: &str = "admin";

#[derive(Debug, Clone, Copy)]
pub struct Subject {
    pub id: &'static str,
    pub name: &'static str,
}

pub const SUBJECTS: [Subject; 5] = [
    Subject { id: "M1_History", name: "ม.1 ประวัติศาสตร์" },
    Subject { id: "M1_Social", name: "ม.1 สังคมศึกษา" },
    Subject { id: "M5_History", name: "ม.5 ประวัติศาสตร์" },
    Subject { id: "M5_Social", name: "ม.5 สังคมศึกษา" },
    Subject { id: "M6_Social", name: "ม.6 สังคมศึกษา" },
];

pub fn subject_name(class_id: &str) -> Option<&'static str> {
    SUBJECTS.iter().find(|s| s.id == class_id).map(|s| s.name)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Http,
    Postgres,
    Local,
}

impl FromStr for Backend {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "http" | "sheets" => Ok(Backend::Http),
            "postgres" | "pg" => Ok(Backend::Postgres),
            "local" | "mock" => Ok(Backend::Local),
            other => bail!("unknown backend '{other}' (expected http, postgres or local)"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub backend: Backend,
    pub endpoint: Option<String>,
    pub database_url: Option<String>,
    pub mock_path: PathBuf,
    pub mock_latency: Duration,
    pub teacher_password: String,
}

impl Settings {
    pub fn from_env(backend_override: Option<Backend>) -> anyhow::Result<Self> {
        let endpoint = non_empty_var("GRADEBOOK_ENDPOINT");
        let database_url = non_empty_var("DATABASE_URL");

        let backend = match backend_override {
            Some(backend) => backend,
            None => match non_empty_var("GRADEBOOK_BACKEND") {
                Some(value) => value.parse().context("invalid GRADEBOOK_BACKEND")?,
                None if endpoint.is_some() => Backend::Http,
                None => Backend::Local,
            },
        };

        let mock_path = non_empty_var("GRADEBOOK_MOCK_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_MOCK_PATH));
        let mock_latency = match non_empty_var("GRADEBOOK_MOCK_LATENCY_MS") {
            Some(value) => Duration::from_millis(
                value
                    .trim()
                    .parse()
                    .context("GRADEBOOK_MOCK_LATENCY_MS must be a whole number of milliseconds")?,
            ),
            None => Duration::ZERO,
        };
        let teacher_password = non_empty_var("TEACHER_PASSWORD")
            .unwrap_or_else(|| DEFAULT_TEACHER_PASSWORD.to_string());

        Ok(Self {
            backend,
            endpoint,
            database_url,
            mock_path,
            mock_latency,
            teacher_password,
        })
    }

    pub fn endpoint(&self) -> anyhow::Result<&str> {
        self.endpoint
            .as_deref()
            .context("GRADEBOOK_ENDPOINT must be set to the spreadsheet script URL")
    }

    pub fn database_url(&self) -> anyhow::Result<&str> {
        self.database_url
            .as_deref()
            .context("DATABASE_URL must be set to a production Postgres instance")
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_parses_aliases() {
        assert_eq!("HTTP".parse::<Backend>().unwrap(), Backend::Http);
        assert_eq!("pg".parse::<Backend>().unwrap(), Backend::Postgres);
        assert_eq!(" mock ".parse::<Backend>().unwrap(), Backend::Local);
        assert!("redis".parse::<Backend>().is_err());
    }

    #[test]
    fn subject_names_resolve() {
        assert_eq!(subject_name("M6_Social"), Some("ม.6 สังคมศึกษา"));
        assert_eq!(subject_name("M2_Art"), None);
    }

    #[test]
    fn explicit_backend_wins() {
        let settings = Settings::from_env(Some(Backend::Local)).unwrap();
        assert_eq!(settings.backend, Backend::Local);
        assert!(!settings.teacher_password.is_empty());
    }
}
