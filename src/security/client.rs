//! Client identification.

use std::convert::Infallible;
use std::net::{IpAddr, SocketAddr};

use axum::extract::{ConnectInfo, FromRef, FromRequestParts};
use axum::http::header::USER_AGENT;
use axum::http::request::Parts;

use crate::http::state::GateState;

/// The address and user agent a request came from.
///
/// `ip` is `None` when no usable address could be determined; every admin
/// check treats that as a denial.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ClientInfo {
    pub ip: Option<IpAddr>,
    pub user_agent: String,
}

impl ClientInfo {
    pub fn from_parts(parts: &Parts, trust_forwarded_for: bool) -> Self {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip());

        let ip = if trust_forwarded_for {
            match parts.headers.get("x-forwarded-for") {
                Some(value) => value
                    .to_str()
                    .ok()
                    .and_then(|v| v.split(',').next())
                    .and_then(|first| first.trim().parse::<IpAddr>().ok()),
                None => peer,
            }
        } else {
            peer
        };

        let user_agent = parts
            .headers
            .get(USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();

        Self {
            ip: ip.map(|ip| ip.to_canonical()),
            user_agent,
        }
    }
}

impl<S> FromRequestParts<S> for ClientInfo
where
    GateState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let trust = GateState::from_ref(state).config.load().admin.trust_forwarded_for;
        Ok(Self::from_parts(parts, trust))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts(forwarded: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/").header(USER_AGENT, "Mozilla/5.0");
        if let Some(value) = forwarded {
            builder = builder.header("x-forwarded-for", value);
        }
        let mut request = builder.body(()).unwrap();
        request
            .extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([10, 0, 0, 9], 4000))));
        request.into_parts().0
    }

    #[test]
    fn test_peer_address_by_default() {
        let client = ClientInfo::from_parts(&parts(Some("1.2.3.4")), false);
        assert_eq!(client.ip, Some(IpAddr::from([10, 0, 0, 9])));
        assert_eq!(client.user_agent, "Mozilla/5.0");
    }

    #[test]
    fn test_forwarded_for_when_trusted() {
        let client = ClientInfo::from_parts(&parts(Some("1.2.3.4, 10.0.0.1")), true);
        assert_eq!(client.ip, Some(IpAddr::from([1, 2, 3, 4])));

        let client = ClientInfo::from_parts(&parts(None), true);
        assert_eq!(client.ip, Some(IpAddr::from([10, 0, 0, 9])));
    }

    #[test]
    fn test_garbage_forwarded_for_is_unknown() {
        let client = ClientInfo::from_parts(&parts(Some("not-an-ip")), true);
        assert_eq!(client.ip, None);
    }

    #[test]
    fn test_mapped_ipv6_is_canonical() {
        let mut request = Request::builder().uri("/").body(()).unwrap();
        let mapped: IpAddr = "::ffff:127.0.0.1".parse().unwrap();
        request
            .extensions_mut()
            .insert(ConnectInfo(SocketAddr::new(mapped, 4000)));

        let client = ClientInfo::from_parts(&request.into_parts().0, false);
        assert_eq!(client.ip, Some(IpAddr::from([127, 0, 0, 1])));
    }
}
