use crate::program::{Output, Program, ProgramError, Property, ResourceRef, ResourceSpec};
use crate::resources::{normalize_name, policy_document};
use std::path::Path;
use tracing::debug;

const ACCOUNT_VARIABLE: &str = "accountId";

#[derive(Debug, Clone)]
pub struct BucketConfig {
    /// Delete objects with the bucket on teardown.
    pub force_destroy: bool,
    pub object_ownership: String,
    pub acl: String,
}

impl Default for BucketConfig {
    fn default() -> Self {
        Self {
            force_destroy: true,
            object_ownership: "BucketOwnerPreferred".to_string(),
            acl: "private".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Bucket {
    pub resource: ResourceRef,
    pub policy: ResourceRef,
}

impl Bucket {
    #[must_use]
    pub fn id(&self) -> Output {
        self.resource.id()
    }

    #[must_use]
    pub fn name(&self) -> Output {
        self.resource.output("bucket")
    }

    #[must_use]
    pub fn arn(&self) -> Output {
        self.resource.arn()
    }

    #[must_use]
    pub fn regional_domain_name(&self) -> Output {
        self.resource.output("bucketRegionalDomainName")
    }
}

/// Declares a private bucket readable by CloudFront and writable by Lambda
/// functions of the same account.
///
/// # Errors
/// Returns an error if any resource cannot be declared.
pub fn bucket(
    program: &mut Program,
    name: &str,
    config: &BucketConfig,
) -> Result<Bucket, ProgramError> {
    let name = normalize_name(name);

    let bucket = program.declare(
        ResourceSpec::new(name.clone(), "aws:s3:BucketV2")
            .set("bucket", &name)
            .set("forceDestroy", config.force_destroy),
    )?;

    let ownership = program.declare(
        ResourceSpec::new(format!("{name}-ownership"), "aws:s3:BucketOwnershipControls")
            .set("bucket", bucket.id())
            .set(
                "rule",
                Property::map([("objectOwnership", &config.object_ownership)]),
            ),
    )?;

    // the ACL is rejected until ownership controls allow ACLs
    program.declare(
        ResourceSpec::new(format!("{name}-acl"), "aws:s3:BucketAclV2")
            .set("bucket", bucket.id())
            .set("acl", &config.acl)
            .depends_on(&ownership),
    )?;

    let account_id = caller_account(program)?;
    let arn = bucket.arn();
    let objects = bucket.arn().apply("{}/*");

    let statement = |service: &str, actions: &[&str]| {
        Property::map([
            ("Effect", Property::from("Allow")),
            (
                "Principal",
                Property::map([("Service", format!("{service}.amazonaws.com"))]),
            ),
            ("Action", Property::list(actions.iter().copied())),
            ("Resource", Property::list([arn.clone(), objects.clone()])),
            (
                "Condition",
                Property::map([(
                    "StringEquals",
                    Property::map([("aws:SourceAccount", account_id.clone())]),
                )]),
            ),
        ])
    };

    let policy = program.declare(
        ResourceSpec::new(format!("{name}-policy"), "aws:s3:BucketPolicy")
            .set("bucket", bucket.id())
            .set(
                "policy",
                policy_document([
                    statement("cloudfront", &["s3:GetObject"]),
                    statement("lambda", &["s3:PutObject", "s3:GetObject", "s3:ListBucket"]),
                ]),
            ),
    )?;

    program.export("bucket_name", bucket.output("bucket"));
    program.export("bucket_arn", bucket.arn());

    Ok(Bucket {
        resource: bucket,
        policy,
    })
}

/// Uploads a local file into `bucket` under `key`.
///
/// # Errors
/// Returns an error if the file does not exist or the object cannot be declared.
pub fn upload_object(
    program: &mut Program,
    bucket: &Bucket,
    object_path: &Path,
    key: &str,
    depends_on: Option<&ResourceRef>,
) -> Result<ResourceRef, ProgramError> {
    let source = object_path
        .canonicalize()
        .map_err(|_| ProgramError::MissingFile(object_path.to_path_buf()))?;
    if !source.is_file() {
        return Err(ProgramError::MissingFile(object_path.to_path_buf()));
    }

    let name = normalize_name(&format!(
        "{}-object-{}",
        bucket.resource.name(),
        object_path.to_string_lossy()
    ));
    debug!(object = %name, key, "uploading object");

    let mut spec = ResourceSpec::new(name, "aws:s3:BucketObject")
        .set("bucket", bucket.id())
        .set("key", key)
        .set("source", Property::FileAsset(source));
    if let Some(dependency) = depends_on {
        spec = spec.depends_on(dependency);
    }

    program.declare(spec)
}

// One caller identity lookup per program, shared by every bucket.
fn caller_account(program: &mut Program) -> Result<Output, ProgramError> {
    if let Some(account_id) = program.variable(ACCOUNT_VARIABLE) {
        return Ok(account_id);
    }
    program.invoke(
        ACCOUNT_VARIABLE,
        "aws:getCallerIdentity",
        Vec::<(String, Property)>::new(),
        Some("accountId"),
    )
}
