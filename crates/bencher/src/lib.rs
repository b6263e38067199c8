/// A route table and the request paths to look up in it.
#[derive(Debug, Copy, Clone)]
pub struct RouteCase {
    name: &'static str,
    group: RouteGroup,
    patterns: &'static [&'static str],
    paths: &'static [&'static str],
}

impl RouteCase {
    pub const fn new(
        name: &'static str,
        group: RouteGroup,
        patterns: &'static [&'static str],
        paths: &'static [&'static str],
    ) -> Self {
        Self { name, group, patterns, paths }
    }

    pub const fn small(name: &'static str, patterns: &'static [&'static str], paths: &'static [&'static str]) -> Self {
        Self::new(name, RouteGroup::Small, patterns, paths)
    }

    pub const fn large(name: &'static str, patterns: &'static [&'static str], paths: &'static [&'static str]) -> Self {
        Self::new(name, RouteGroup::Large, patterns, paths)
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn group(&self) -> RouteGroup {
        self.group
    }

    /// Patterns in registration order.
    pub fn patterns(&self) -> &'static [&'static str] {
        self.patterns
    }

    pub fn paths(&self) -> &'static [&'static str] {
        self.paths
    }
}

#[derive(Clone, Copy, Debug)]
pub enum RouteGroup {
    Small,
    Large,
}

pub static USERS_PATTERNS: &[&str] = &[
    "/",
    "/about",
    "/login",
    "/users",
    "/users/:id",
    "/users/:user_id/addresses",
    "/users/:user_id/addresses/:address_id",
];

pub static USERS_PATHS: &[&str] = &["/", "/about", "/users/42", "/users/42/addresses/7", "/missing"];

pub static API_PATTERNS: &[&str] = &[
    "/api/v1/health",
    "/api/v1/metrics",
    "/api/v1/orgs",
    "/api/v1/orgs/:org",
    "/api/v1/orgs/:org/members",
    "/api/v1/orgs/:org/members/:member",
    "/api/v1/orgs/:org/repos",
    "/api/v1/orgs/:org/repos/:repo",
    "/api/v1/orgs/:org/repos/:repo/issues",
    "/api/v1/orgs/:org/repos/:repo/issues/:issue",
    "/api/v1/orgs/:org/repos/:repo/issues/:issue/comments",
    "/api/v1/orgs/:org/repos/:repo/issues/:issue/comments/:comment",
    "/api/v1/orgs/:org/repos/:repo/pulls",
    "/api/v1/orgs/:org/repos/:repo/pulls/:pull",
    "/api/v1/orgs/:org/repos/:repo/pulls/:pull/reviews",
    "/api/v1/users",
    "/api/v1/users/:user",
    "/api/v1/users/:user/keys",
    "/api/v1/users/:user/keys/:key",
    "/api/v1/users/:user/starred",
];

pub static API_PATHS: &[&str] = &[
    "/api/v1/health",
    "/api/v1/orgs/rust-lang/repos/cargo/issues/1024/comments/7",
    "/api/v1/users/ferris/starred",
    "/api/v1/orgs/rust-lang/repos/cargo/pulls/9/reviews",
    "/api/v2/unknown",
];
