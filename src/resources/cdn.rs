use crate::program::{Output, Program, ProgramError, Property, ResourceRef, ResourceSpec};
use crate::resources::{bucket::Bucket, normalize_name};
use std::collections::BTreeMap;

// CloudFront managed policies
const CACHING_OPTIMIZED: &str = "b2884449-e4de-46a7-ac36-70bc7f1ddd6d";
const CORS_S3_ORIGIN: &str = "88a5eaf4-2fd4-4709-b370-b4c650ea3fcf";
const SIMPLE_CORS: &str = "60669652-455b-4ae9-85a4-c4c02393f86c";

#[derive(Debug, Clone)]
pub struct CdnConfig {
    pub path_pattern: String,
    pub default_root_object: String,
    pub compress: bool,
    /// ISO 3166 country codes allowed to reach the distribution; empty means
    /// no restriction.
    pub geo_locations: Vec<String>,
    pub tags: BTreeMap<String, String>,
}

impl Default for CdnConfig {
    fn default() -> Self {
        Self {
            path_pattern: "/*".to_string(),
            default_root_object: "index.html".to_string(),
            compress: false,
            geo_locations: Vec::new(),
            tags: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Cdn {
    pub access_control: ResourceRef,
    pub distribution: ResourceRef,
}

impl Cdn {
    #[must_use]
    pub fn domain_name(&self) -> Output {
        self.distribution.output("domainName")
    }
}

/// Declares a CloudFront distribution serving `bucket` through an origin
/// access control.
///
/// # Errors
/// Returns an error if either resource cannot be declared.
pub fn cdn(
    program: &mut Program,
    name: &str,
    bucket: &Bucket,
    config: &CdnConfig,
) -> Result<Cdn, ProgramError> {
    let name = normalize_name(name);
    let origin_id = format!("{name}-s3-origin");

    let access_control = program.declare(
        ResourceSpec::new(format!("{name}-oac"), "aws:cloudfront:OriginAccessControl")
            .set("name", &name)
            .set("description", "OAC for S3 origin")
            .set("originAccessControlOriginType", "s3")
            .set("signingBehavior", "always")
            .set("signingProtocol", "sigv4"),
    )?;

    let get_head = || Property::list(["GET", "HEAD"]);

    let restriction = if config.geo_locations.is_empty() {
        "none"
    } else {
        "whitelist"
    };

    let distribution = program.declare(
        ResourceSpec::new(format!("{name}-cdn"), "aws:cloudfront:Distribution")
            .set("enabled", true)
            .set("isIpv6Enabled", true)
            .set("defaultRootObject", &config.default_root_object)
            .set(
                "origins",
                vec![Property::map([
                    ("domainName", Property::from(bucket.regional_domain_name())),
                    ("originId", Property::from(&origin_id)),
                    ("originAccessControlId", Property::from(access_control.id())),
                ])],
            )
            .set(
                "defaultCacheBehavior",
                Property::map([
                    ("cachePolicyId", Property::from(CACHING_OPTIMIZED)),
                    ("originRequestPolicyId", Property::from(CORS_S3_ORIGIN)),
                    ("responseHeadersPolicyId", Property::from(SIMPLE_CORS)),
                    ("allowedMethods", get_head()),
                    ("cachedMethods", get_head()),
                    ("targetOriginId", Property::from(&origin_id)),
                    ("viewerProtocolPolicy", Property::from("redirect-to-https")),
                    ("compress", Property::from(config.compress)),
                ]),
            )
            .set(
                "orderedCacheBehaviors",
                vec![Property::map([
                    ("pathPattern", Property::from(&config.path_pattern)),
                    ("allowedMethods", get_head()),
                    ("cachedMethods", get_head()),
                    ("targetOriginId", Property::from(&origin_id)),
                    ("viewerProtocolPolicy", Property::from("redirect-to-https")),
                    ("cachePolicyId", Property::from(CACHING_OPTIMIZED)),
                    ("compress", Property::from(config.compress)),
                ])],
            )
            .set(
                "restrictions",
                Property::map([(
                    "geoRestriction",
                    Property::map([
                        ("restrictionType", Property::from(restriction)),
                        ("locations", Property::list(config.geo_locations.iter())),
                    ]),
                )]),
            )
            .set("tags", config.tags.clone())
            .set(
                "viewerCertificate",
                Property::map([("cloudfrontDefaultCertificate", true)]),
            ),
    )?;

    program.export("s3_distribution_id", distribution.id());
    program.export("s3_distribution_domain_name", distribution.output("domainName"));

    Ok(Cdn {
        access_control,
        distribution,
    })
}
