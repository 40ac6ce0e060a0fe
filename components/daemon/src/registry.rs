// Copyright 2024 lazycfg
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::fmt;

use lazycfg_common::{
    DOCKER_HUB_API_HOST, DOCKER_HUB_DOMAIN, DOCKER_HUB_OFFICIAL_REPO_PREFIX, VPC_HOST_SUFFIX,
};

use crate::err::{ImageReferenceSnafu, Result};

/// A parsed image reference, normalized the way docker does:
/// `busybox` is `docker.io/library/busybox`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageReference {
    pub host:   String,
    pub repo:   String,
    pub tag:    Option<String>,
    pub digest: Option<String>,
}

impl ImageReference {
    pub fn parse(image: &str) -> Result<Self> {
        let invalid = |reason: &str| {
            ImageReferenceSnafu {
                image,
                reason,
            }
            .fail()
        };

        if image.is_empty() {
            return invalid("empty reference");
        }
        if image.chars().any(char::is_whitespace) {
            return invalid("contains whitespace");
        }

        let (name, digest) = match image.split_once('@') {
            Some((name, digest)) => {
                if !is_valid_digest(digest) {
                    return invalid("invalid digest");
                }
                (name, Some(digest.to_string()))
            }
            None => (image, None),
        };

        // A colon after the last slash starts the tag, others belong to a port.
        let (name, tag) = match name.rfind(':') {
            Some(i) if !name[i + 1..].contains('/') => (&name[..i], Some(&name[i + 1..])),
            _ => (name, None),
        };
        if let Some(tag) = tag {
            if !is_valid_tag(tag) {
                return invalid("invalid tag");
            }
        }

        let (host, repo) = match name.split_once('/') {
            Some((first, rest)) if first.contains(['.', ':']) || first == "localhost" => (first, rest),
            _ => (DOCKER_HUB_DOMAIN, name),
        };
        if !is_valid_host(host) {
            return invalid("invalid registry host");
        }
        if repo.is_empty() || !repo.split('/').all(is_valid_path_component) {
            return invalid("invalid repository name");
        }

        let host = if host == DOCKER_HUB_API_HOST { DOCKER_HUB_DOMAIN } else { host };
        let repo = if host == DOCKER_HUB_DOMAIN && !repo.contains('/') {
            format!("{DOCKER_HUB_OFFICIAL_REPO_PREFIX}/{repo}")
        } else {
            repo.to_string()
        };

        Ok(Self {
            host: host.to_string(),
            repo,
            tag: tag.map(str::to_string),
            digest,
        })
    }
}

impl fmt::Display for ImageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.host, self.repo)?;
        if let Some(tag) = &self.tag {
            write!(f, ":{tag}")?;
        }
        if let Some(digest) = &self.digest {
            write!(f, "@{digest}")?;
        }
        Ok(())
    }
}

/// `name(.name)*` or a bracketed IPv6 address, each with an optional
/// `:port`.
fn is_valid_host(host: &str) -> bool {
    let port = match host.strip_prefix('[') {
        Some(bracketed) => match bracketed.split_once(']') {
            Some((addr, rest)) if is_valid_ipv6(addr) => rest,
            _ => return false,
        },
        None => {
            let (name, rest) = match host.find(':') {
                Some(i) => host.split_at(i),
                None => (host, ""),
            };
            if !name.split('.').all(is_valid_domain_component) {
                return false;
            }
            rest
        }
    };
    match port.strip_prefix(':') {
        Some(port) => !port.is_empty() && port.chars().all(|c| c.is_ascii_digit()),
        None => port.is_empty(),
    }
}

fn is_valid_domain_component(component: &str) -> bool {
    let bytes = component.as_bytes();
    match (bytes.first(), bytes.last()) {
        (Some(first), Some(last)) => {
            first.is_ascii_alphanumeric()
                && last.is_ascii_alphanumeric()
                && bytes.iter().all(|b| b.is_ascii_alphanumeric() || *b == b'-')
        }
        _ => false,
    }
}

fn is_valid_ipv6(addr: &str) -> bool {
    addr.contains(':') && addr.chars().all(|c| c.is_ascii_hexdigit() || c == ':')
}

fn is_valid_path_component(component: &str) -> bool {
    let mut chars = component.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_lowercase() || c.is_ascii_digit())
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '.' | '_' | '-'))
}

fn is_valid_tag(tag: &str) -> bool {
    (1..=128).contains(&tag.len())
        && tag
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
}

fn is_valid_digest(digest: &str) -> bool {
    match digest.split_once(':') {
        Some((algorithm, hex)) => {
            !algorithm.is_empty() && !hex.is_empty() && hex.chars().all(|c| c.is_ascii_hexdigit())
        }
        None => false,
    }
}

/// Registry host policies applied before mirrors and credentials are looked
/// up.
pub trait HostRewrite: Send + Sync {
    /// The private network host of a registry.
    fn vpc_host(&self, host: &str) -> String;

    /// The host serving the registry API for a user facing domain.
    fn canonical_host(&self, host: &str) -> String;
}

/// `registry.example.com` is reached as `registry-vpc.example.com` from a
/// VPC, and docker hub is served from `index.docker.io`.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultHostRewrite;

impl HostRewrite for DefaultHostRewrite {
    fn vpc_host(&self, host: &str) -> String {
        let (name, port) = match host.rsplit_once(':') {
            Some((name, port)) if port.chars().all(|c| c.is_ascii_digit()) => (name, Some(port)),
            _ => (host, None),
        };
        let (first, rest) = match name.split_once('.') {
            Some((first, rest)) => (first, Some(rest)),
            None => (name, None),
        };
        if first.ends_with(VPC_HOST_SUFFIX) {
            return host.to_string();
        }
        let mut vpc = format!("{first}{VPC_HOST_SUFFIX}");
        if let Some(rest) = rest {
            vpc.push('.');
            vpc.push_str(rest);
        }
        if let Some(port) = port {
            vpc.push(':');
            vpc.push_str(port);
        }
        vpc
    }

    fn canonical_host(&self, host: &str) -> String {
        if host == DOCKER_HUB_DOMAIN {
            DOCKER_HUB_API_HOST.to_string()
        } else {
            host.to_string()
        }
    }
}
