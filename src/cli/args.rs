//! Command-line argument parsing

use crate::config::{
    ArtifactoryConfig, ConfigError, Credentials, MigrationConfig, RunOptions, SourceConfig,
    NUM_OF_WORKERS,
};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "docker-registry-migrator")]
#[command(about = "Docker registry to Artifactory migrator")]
#[command(version, author)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// A generic tool to migrate a single registry
    Generic {
        /// The source registry URL
        source: String,

        #[arg(
            long = "source-username",
            help = "The username to use for authentication to the source"
        )]
        source_username: Option<String>,

        #[arg(
            long = "source-password",
            help = "The password to use for authentication to the source"
        )]
        source_password: Option<String>,

        #[command(flatten)]
        artifactory: ArtifactoryArgs,

        #[command(flatten)]
        options: ExtraArgs,
    },

    /// A tool specifically for Quay SaaS
    Quay {
        /// The username or organization to import repositories from
        namespace: String,

        /// The OAuth2 Access Token
        token: String,

        #[command(flatten)]
        artifactory: ArtifactoryArgs,

        #[command(flatten)]
        options: ExtraArgs,
    },

    /// A tool specifically for Quay Enterprise
    #[command(name = "quayee")]
    QuayEnterprise {
        /// The source registry URL
        source: String,

        #[arg(long = "source-username", help = "The super user username")]
        source_username: Option<String>,

        #[arg(long = "source-password", help = "The super user password")]
        source_password: Option<String>,

        #[arg(long = "token", help = "The OAuth2 Access Token")]
        token: Option<String>,

        #[command(flatten)]
        artifactory: ArtifactoryArgs,

        #[command(flatten)]
        options: ExtraArgs,
    },
}

/// Destination positionals shared by every mode
#[derive(Args, Debug, Clone)]
#[command(next_help_heading = "Artifactory")]
pub struct ArtifactoryArgs {
    /// The destination Artifactory URL
    pub artifactory: String,

    /// The username to use for authentication to Artifactory
    pub username: String,

    /// The password (API key, encrypted password or token) to use for authentication to Artifactory
    pub password: String,

    /// The docker repository
    pub repo: String,
}

/// Flags shared by every mode
#[derive(Args, Debug, Clone)]
pub struct ExtraArgs {
    #[arg(
        long = "ignore-certs",
        help = "Ignore any certificate errors from both source and destination"
    )]
    pub ignore_cert: bool,

    #[arg(long = "overwrite", help = "Overwrite existing image/tag on the destination")]
    pub overwrite: bool,

    #[arg(
        long = "num-of-workers",
        env = "DOCKER_MIGRATOR_WORKERS",
        default_value_t = NUM_OF_WORKERS,
        help = "Number of workers"
    )]
    pub workers: usize,

    #[arg(
        short = 'v',
        long = "verbose",
        env = "DOCKER_MIGRATOR_VERBOSE",
        help = "Make the operation more talkative"
    )]
    pub verbose: bool,

    #[arg(
        long = "image-file",
        help = "Limit the import to a set of images in the provided file. \
                Format of new line separated file: '<image-name>:<tag>' OR \
                '<image-name>' to import all tags of that repository."
    )]
    pub image_file: Option<PathBuf>,

    #[arg(
        long = "failed-output",
        help = "Write the images that failed to migrate to this file, \
                one '<image-name>:<tag>' per line"
    )]
    pub failed_output: Option<PathBuf>,
}

impl ExtraArgs {
    fn into_options(self) -> RunOptions {
        RunOptions {
            workers: self.workers,
            overwrite: self.overwrite,
            ignore_cert: self.ignore_cert,
            image_file: self.image_file,
            failed_output: self.failed_output,
            verbose: self.verbose,
        }
    }
}

impl ArtifactoryArgs {
    fn into_config(self) -> ArtifactoryConfig {
        ArtifactoryConfig {
            url: self.artifactory,
            credentials: Credentials::new(self.username, self.password),
            repo: self.repo,
        }
    }
}

impl Cli {
    pub fn parse_args() -> Self {
        Cli::parse()
    }

    pub fn verbose(&self) -> bool {
        match &self.command {
            Command::Generic { options, .. }
            | Command::Quay { options, .. }
            | Command::QuayEnterprise { options, .. } => options.verbose,
        }
    }

    /// Validate the arguments into a run configuration
    pub fn into_config(self) -> Result<MigrationConfig, ConfigError> {
        let (source, artifactory, options) = match self.command {
            Command::Generic {
                source,
                source_username,
                source_password,
                artifactory,
                options,
            } => {
                let credentials = Credentials::from_pair(source_username, source_password)?;
                (
                    SourceConfig::Generic {
                        url: source,
                        credentials,
                    },
                    artifactory,
                    options,
                )
            }
            Command::Quay {
                namespace,
                token,
                artifactory,
                options,
            } => (SourceConfig::Quay { namespace, token }, artifactory, options),
            Command::QuayEnterprise {
                source,
                source_username,
                source_password,
                token,
                artifactory,
                options,
            } => {
                let credentials =
                    Credentials::pair_or_token(source_username, source_password, token)?;
                (
                    SourceConfig::QuayEnterprise {
                        url: source,
                        credentials,
                    },
                    artifactory,
                    options,
                )
            }
        };

        MigrationConfig::new(source, artifactory.into_config(), options.into_options())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OAUTH_TOKEN_USERNAME;

    const ART: [&str; 4] = [
        "https://art.example.com/artifactory",
        "admin",
        "secret",
        "docker-local",
    ];

    fn parse(args: &[&str]) -> Result<MigrationConfig, ConfigError> {
        let argv = std::iter::once("docker-registry-migrator")
            .chain(args.iter().copied())
            .chain(ART);
        Cli::try_parse_from(argv).unwrap().into_config()
    }

    #[test]
    fn test_generic_defaults() {
        let config = parse(&["generic", "https://registry.example.com"]).unwrap();
        assert_eq!(config.settings.workers(), NUM_OF_WORKERS);
        assert!(!config.settings.overwrite());
        assert!(!config.ignore_cert);
        assert_eq!(config.destination.repo, "docker-local");
        assert_eq!(
            config.source,
            SourceConfig::Generic {
                url: "https://registry.example.com".to_string(),
                credentials: None
            }
        );
    }

    #[test]
    fn test_generic_requires_both_credentials() {
        let err = parse(&[
            "generic",
            "https://registry.example.com",
            "--source-username",
            "bob",
        ])
        .unwrap_err();
        assert_eq!(err, ConfigError::IncompleteCredentials);
    }

    #[test]
    fn test_shared_flags() {
        let config = parse(&[
            "generic",
            "https://registry.example.com",
            "--num-of-workers",
            "8",
            "--overwrite",
            "--ignore-certs",
            "--image-file",
            "images.txt",
        ])
        .unwrap();
        assert_eq!(config.settings.workers(), 8);
        assert!(config.settings.overwrite());
        assert!(config.ignore_cert);
        assert_eq!(config.image_file, Some(PathBuf::from("images.txt")));
    }

    #[test]
    fn test_worker_count_out_of_range() {
        let err = parse(&["generic", "https://registry.example.com", "--num-of-workers", "0"])
            .unwrap_err();
        assert!(matches!(err, ConfigError::WorkerCount { value: 0, .. }));
    }

    #[test]
    fn test_quay_enterprise_token() {
        let config = parse(&["quayee", "https://quay.example.com", "--token", "abc"]).unwrap();
        assert_eq!(
            config.source.registry_credentials(),
            Some(Credentials::new(OAUTH_TOKEN_USERNAME, "abc"))
        );

        let err = parse(&[
            "quayee",
            "https://quay.example.com",
            "--token",
            "abc",
            "--source-username",
            "u",
            "--source-password",
            "p",
        ])
        .unwrap_err();
        assert_eq!(err, ConfigError::ConflictingCredentials);
    }

    #[test]
    fn test_quay_positionals() {
        let config = parse(&["quay", "acme", "tok"]).unwrap();
        assert_eq!(
            config.source,
            SourceConfig::Quay {
                namespace: "acme".to_string(),
                token: "tok".to_string()
            }
        );
    }
}
