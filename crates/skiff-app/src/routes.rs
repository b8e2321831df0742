//! The console route tree.

use skiff_nav::{NavResult, RouteSpec, RouteTable};

/// Landing page after sign-in.
pub const HOME_ROUTE: &str = "root.home_layout.index";

/// Sign-in page, the target of authentication redirects.
pub const LOGIN_ROUTE: &str = "root.login";

/// Fallback for unresolvable targets.
const NOT_FOUND_ROUTE: &str = "root.notfound";

/// Declarative configuration of the admin console.
///
/// The `home_layout` subtree requires an authenticated session; its tabs
/// inherit the requirement.
#[must_use]
pub fn console_routes() -> RouteSpec {
    RouteSpec::new("ROOT", "/")
        .child(
            "home_layout",
            RouteSpec::new("Home", "/home")
                .protected()
                .child("index", RouteSpec::new("Dashboard", "/home/index"))
                .child("torrent", RouteSpec::new("Torrent search", "/home/torrent"))
                .child("settings", RouteSpec::new("Settings", "/settings"))
                .child("task_list", RouteSpec::new("Jobs", "/home/log"))
                .child("task_profile", RouteSpec::new("Job detail", "/home/log_profile")),
        )
        .child("login", RouteSpec::new("Sign in", "/login"))
        .child("register", RouteSpec::new("Sign up", "/register"))
        .child("notfound", RouteSpec::new("404", "/notfound"))
}

/// Flattened console route table.
///
/// # Errors
///
/// Fails only if the declaration above is inconsistent, which the tests pin
/// down.
pub fn console_table() -> NavResult<RouteTable> {
    RouteTable::build("root", console_routes(), NOT_FOUND_ROUTE)
}
