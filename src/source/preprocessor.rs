//! # Response Pre-processor
//!
//! Scans the top-level members of a response body one at a time. The resource
//! array is captured as a borrowed raw slice and left unparsed; only the
//! pagination members are decoded. Everything else is skipped without
//! allocation.

use reqwest::Url;
use serde::de::{self, Deserialize, Deserializer, IgnoredAny, MapAccess, Visitor};
use serde_json::value::RawValue;
use std::fmt;
use tracing::warn;

use super::fetcher::FetchRequest;

/// Top-level member names that carry a resource payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    Groups,
    Organization,
    Organizations,
    OrganizationFields,
    User,
    Users,
    UserFields,
    Ticket,
    Tickets,
    TicketFields,
    Audits,
    TicketMetric,
    TicketMetrics,
    SatisfactionRatings,
}

impl Resource {
    pub fn from_key(key: &str) -> Option<Self> {
        let resource = match key {
            "groups" => Resource::Groups,
            "organization" => Resource::Organization,
            "organizations" => Resource::Organizations,
            "organization_fields" => Resource::OrganizationFields,
            "user" => Resource::User,
            "users" => Resource::Users,
            "user_fields" => Resource::UserFields,
            "ticket" => Resource::Ticket,
            "tickets" => Resource::Tickets,
            "ticket_fields" => Resource::TicketFields,
            "audits" => Resource::Audits,
            "ticket_metric" => Resource::TicketMetric,
            "ticket_metrics" => Resource::TicketMetrics,
            "satisfaction_ratings" => Resource::SatisfactionRatings,
            _ => return None,
        };
        Some(resource)
    }

    pub fn key(self) -> &'static str {
        match self {
            Resource::Groups => "groups",
            Resource::Organization => "organization",
            Resource::Organizations => "organizations",
            Resource::OrganizationFields => "organization_fields",
            Resource::User => "user",
            Resource::Users => "users",
            Resource::UserFields => "user_fields",
            Resource::Ticket => "ticket",
            Resource::Tickets => "tickets",
            Resource::TicketFields => "ticket_fields",
            Resource::Audits => "audits",
            Resource::TicketMetric => "ticket_metric",
            Resource::TicketMetrics => "ticket_metrics",
            Resource::SatisfactionRatings => "satisfaction_ratings",
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// What one response body contains, borrowed from the body it was scanned from.
///
/// `resource == None` means no recognised resource member was present and the
/// response should be dropped.
#[derive(Debug, Default)]
pub struct RequestDescriptor<'a> {
    pub resource: Option<Resource>,
    pub payload: Option<&'a RawValue>,
    pub count: Option<i64>,
    pub next_page: Option<String>,
    pub after_cursor: Option<String>,
    pub after_url: Option<String>,
    pub end_of_stream: Option<bool>,
}

/// Scan `body` into a [`RequestDescriptor`].
pub fn pre_process(body: &[u8]) -> Result<RequestDescriptor<'_>, serde_json::Error> {
    serde_json::from_slice(body)
}

impl<'a> RequestDescriptor<'a> {
    /// URI of the next page to fetch for `request`, if the response asks for one.
    ///
    /// Incremental exports continue while a page reports at least
    /// `page_size_ceiling` results (or, for cursor exports, until
    /// `end_of_stream`). Other endpoints continue while `next_page` or an
    /// `after_cursor` is present. `previous_page` is never a continuation.
    pub fn continuation(&self, request: &FetchRequest, page_size_ceiling: i64) -> Option<Url> {
        let target = if request.is_incremental() {
            match self.end_of_stream {
                Some(end) => (!end).then_some(self.after_url.as_ref()).flatten(),
                None if self.count.unwrap_or(0) >= page_size_ceiling => self.next_page.as_ref(),
                None => None,
            }
        } else {
            self.next_page.as_ref().or_else(|| {
                self.after_cursor
                    .as_ref()
                    .and_then(|_| self.after_url.as_ref())
            })
        }?;

        match request.url().join(target) {
            Ok(url) if url != *request.url() => Some(url),
            Ok(url) => {
                warn!(uri = %url, "Continuation points at the page just fetched; not following");
                None
            }
            Err(e) => {
                warn!(uri = %target, error = %e, "Ignoring unparseable continuation");
                None
            }
        }
    }
}

enum Member {
    Resource(Resource),
    Count,
    NextPage,
    AfterCursor,
    AfterUrl,
    EndOfStream,
    Other,
}

impl<'de> Deserialize<'de> for Member {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct MemberVisitor;

        impl<'de> Visitor<'de> for MemberVisitor {
            type Value = Member;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a member name")
            }

            fn visit_str<E: de::Error>(self, key: &str) -> Result<Member, E> {
                Ok(match key {
                    "count" => Member::Count,
                    "next_page" => Member::NextPage,
                    "after_cursor" => Member::AfterCursor,
                    "after_url" => Member::AfterUrl,
                    "end_of_stream" => Member::EndOfStream,
                    other => Resource::from_key(other).map_or(Member::Other, Member::Resource),
                })
            }
        }

        deserializer.deserialize_identifier(MemberVisitor)
    }
}

struct DescriptorVisitor;

impl<'de> Visitor<'de> for DescriptorVisitor {
    type Value = RequestDescriptor<'de>;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a JSON object response body")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
        let mut descriptor = RequestDescriptor::default();

        while let Some(member) = map.next_key::<Member>()? {
            match member {
                // Side-loaded collections after the primary resource are ignored
                Member::Resource(resource) if descriptor.resource.is_none() => {
                    descriptor.resource = Some(resource);
                    descriptor.payload = Some(map.next_value::<&'de RawValue>()?);
                }
                Member::Count => descriptor.count = map.next_value()?,
                Member::NextPage => descriptor.next_page = non_empty(map.next_value()?),
                Member::AfterCursor => descriptor.after_cursor = non_empty(map.next_value()?),
                Member::AfterUrl => descriptor.after_url = non_empty(map.next_value()?),
                Member::EndOfStream => descriptor.end_of_stream = map.next_value()?,
                Member::Resource(_) | Member::Other => {
                    map.next_value::<IgnoredAny>()?;
                }
            }
        }

        Ok(descriptor)
    }
}

impl<'de> Deserialize<'de> for RequestDescriptor<'de> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(DescriptorVisitor)
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.is_empty())
}
