use anyhow::{anyhow, Result};
use gateway_policy_compiler_core::routes::{
    HeaderMatch, HttpRouteMatch, Method, PathMatch, QueryParamMatch,
};
use gateway_policy_compiler_k8s_api::httproute as api;

pub(crate) fn try_match(
    api::HttpRouteMatch {
        path,
        headers,
        query_params,
        method,
    }: api::HttpRouteMatch,
) -> Result<HttpRouteMatch> {
    let path = path.map(path_match).transpose()?;

    let headers = headers
        .into_iter()
        .flatten()
        .map(header_match)
        .collect::<Result<_>>()?;

    let query_params = query_params
        .into_iter()
        .flatten()
        .map(query_param_match)
        .collect::<Result<_>>()?;

    let method = method.as_deref().map(Method::try_from).transpose()?;

    Ok(HttpRouteMatch {
        path,
        headers,
        query_params,
        method,
    })
}

pub(crate) fn path_match(path_match: api::HttpPathMatch) -> Result<PathMatch> {
    match path_match {
        api::HttpPathMatch::Exact { value } | api::HttpPathMatch::PathPrefix { value }
            if !value.starts_with('/') =>
        {
            Err(anyhow!(
                "path matches must be absolute (begin with `/`); {value:?} is not an absolute path"
            ))
        }
        api::HttpPathMatch::Exact { value } => Ok(PathMatch::Exact(value)),
        api::HttpPathMatch::PathPrefix { value } => Ok(PathMatch::Prefix(value)),
        api::HttpPathMatch::RegularExpression { value } => {
            value.parse().map(PathMatch::Regex).map_err(Into::into)
        }
    }
}

pub(crate) fn header_match(header_match: api::HttpHeaderMatch) -> Result<HeaderMatch> {
    match header_match {
        api::HttpHeaderMatch::Exact { name, value } => {
            Ok(HeaderMatch::Exact(name.parse()?, value.parse()?))
        }
        api::HttpHeaderMatch::RegularExpression { name, value } => {
            Ok(HeaderMatch::Regex(name.parse()?, value.parse()?))
        }
    }
}

pub(crate) fn query_param_match(query_match: api::HttpQueryParamMatch) -> Result<QueryParamMatch> {
    match query_match {
        api::HttpQueryParamMatch::Exact { name, value } => Ok(QueryParamMatch::Exact(name, value)),
        api::HttpQueryParamMatch::RegularExpression { name, value } => {
            Ok(QueryParamMatch::Regex(name, value.parse()?))
        }
    }
}

/// The hostnames an action set may be scoped to for a route under a listener:
/// the route's hostnames narrowed to those the listener can serve. A route
/// with no hostnames adopts the listener's, or the catch-all.
pub(crate) fn hostnames_for(
    route_hostnames: &[String],
    listener_hostname: Option<&str>,
) -> Vec<String> {
    if route_hostnames.is_empty() {
        return vec![listener_hostname.unwrap_or("*").to_string()];
    }
    match listener_hostname {
        None => route_hostnames.to_vec(),
        Some(listener) => route_hostnames
            .iter()
            .filter(|hostname| hostnames_compatible(listener, hostname))
            .cloned()
            .collect(),
    }
}

pub(crate) fn hostnames_compatible(listener: &str, hostname: &str) -> bool {
    if listener == "*" || hostname == "*" {
        return true;
    }
    // A wildcard hostname keeps its dot when the leading `*` is stripped, so
    // suffix comparison cannot match partial labels.
    match (listener.strip_prefix('*'), hostname.strip_prefix('*')) {
        (None, None) => listener == hostname,
        (Some(suffix), None) => hostname.ends_with(suffix),
        (None, Some(suffix)) => listener.ends_with(suffix),
        (Some(a), Some(b)) => a.ends_with(b) || b.ends_with(a),
    }
}
