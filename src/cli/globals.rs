use secrecy::SecretString;
use std::path::PathBuf;

pub const DEFAULT_WORK_DIR: &str = ".stackwright";
pub const DEFAULT_PULUMI_BIN: &str = "pulumi";

#[derive(Debug, Clone)]
pub struct GlobalArgs {
    pub project: String,
    pub stack: String,
    pub region: String,
    pub access_token: SecretString,
    pub aws_access_key_id: String,
    pub aws_secret_access_key: SecretString,
    pub work_dir: PathBuf,
    pub topology: Option<PathBuf>,
    pub pulumi_bin: String,
}

impl GlobalArgs {
    #[must_use]
    pub fn new(project: String, stack: String, region: String) -> Self {
        Self {
            project,
            stack,
            region,
            access_token: SecretString::default(),
            aws_access_key_id: String::new(),
            aws_secret_access_key: SecretString::default(),
            work_dir: PathBuf::from(DEFAULT_WORK_DIR),
            topology: None,
            pulumi_bin: DEFAULT_PULUMI_BIN.to_string(),
        }
    }

    pub fn set_access_token(&mut self, token: SecretString) {
        self.access_token = token;
    }

    pub fn set_aws_credentials(&mut self, access_key_id: String, secret_access_key: SecretString) {
        self.aws_access_key_id = access_key_id;
        self.aws_secret_access_key = secret_access_key;
    }

    /// Directory receiving packaged function code.
    #[must_use]
    pub fn artifact_dir(&self) -> PathBuf {
        self.work_dir.join("artifacts")
    }
}
