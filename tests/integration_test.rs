use std::cell::Cell;
use std::sync::Arc;

use chrono::{Duration, Utc};
use request_guards::forms::{Form, FormClass, FormKwargs, Forms, FormsHandler, MultipleForms};
use request_guards::{
    predicate, Error, FixedClock, GroupRequirement, Guard, Method, PermissionRequirement,
    Principal, Request, Response, SslOptions, ViolationKind, DEFAULT_MAX_LOGIN_AGE_SECS,
};

fn get(path: &str) -> Request {
    Request::new("req-int", Method::Get, path).with_host("example.com")
}

fn next(_: &Request) -> Result<Response, Error> {
    Ok(Response::ok("next"))
}

#[test]
fn passing_guard_forwards_exactly_once() {
    let calls = Cell::new(0);
    let guard = Guard::login_required();
    let request = get("/inbox/").with_principal(Principal::new("u1", "Alice"));

    let response = guard
        .dispatch(&request, |r: &Request| -> Result<Response, Error> {
            calls.set(calls.get() + 1);
            next(r)
        })
        .unwrap();

    assert_eq!(response.body, "next");
    assert_eq!(calls.get(), 1);
}

#[test]
fn failing_guard_never_reaches_next() {
    let calls = Cell::new(0);
    let guard = Guard::superuser_required();
    let request = get("/admin/").with_principal(Principal::new("u1", "Alice").staff());

    let err = guard
        .dispatch(&request, |r: &Request| -> Result<Response, Error> {
            calls.set(calls.get() + 1);
            next(r)
        })
        .unwrap_err();

    assert_eq!(calls.get(), 0);
    assert_eq!(err.status(), 403);
    assert_eq!(err.violation().unwrap().kind, ViolationKind::NotSuperuser);
}

#[test]
fn predicate_errors_propagate_unchanged() {
    let guard = Guard::new(
        "quota",
        Arc::new(|_: &Request| -> Result<bool, Error> {
            Err(Error::handler("quota backend down"))
        }),
    );
    let err = guard.dispatch(&get("/"), next).unwrap_err();
    assert!(matches!(err, Error::Handler(ref m) if m == "quota backend down"));
}

#[test]
fn group_membership_needs_one_shared_group() {
    let principal = Principal::new("u1", "Alice").in_group("x").in_group("y");
    let request = get("/").with_principal(principal);

    let x = Guard::group_required(GroupRequirement::one("x"));
    assert!(x.dispatch(&request, next).is_ok());

    let z = Guard::group_required(GroupRequirement::new(["z"]).unwrap());
    let err = z.dispatch(&request, next).unwrap_err();
    assert_eq!(err.violation().unwrap().kind, ViolationKind::MissingGroup);
}

#[test]
fn permission_clauses_combine() {
    let guard = Guard::permission_required(Some(
        PermissionRequirement::new().all(["x"]).any(["a", "b"]),
    ));

    let only_x = get("/").with_principal(Principal::new("u1", "Alice").with_perm("x"));
    assert!(guard.dispatch(&only_x, next).is_err());

    let x_and_b =
        get("/").with_principal(Principal::new("u1", "Alice").with_perm("x").with_perm("b"));
    assert!(guard.dispatch(&x_and_b, next).is_ok());

    let superuser = get("/").with_principal(Principal::new("u2", "Root").superuser());
    assert!(guard.dispatch(&superuser, next).is_ok());
}

#[test]
fn recent_login_boundary() {
    let now = Utc::now();
    let guard = Guard::recent_login_required(
        Duration::seconds(DEFAULT_MAX_LOGIN_AGE_SECS),
        Arc::new(FixedClock(now)),
        "/login/",
    )
    .unwrap();

    let fresh = get("/billing/")
        .with_principal(Principal::new("u1", "Alice").logged_in_at(now - Duration::seconds(3000)));
    assert_eq!(guard.dispatch(&fresh, next).unwrap().body, "next");

    let stale = get("/billing/")
        .with_principal(Principal::new("u1", "Alice").logged_in_at(now - Duration::seconds(4000)));
    let response = guard.dispatch(&stale, next).unwrap();
    assert!(response.is_redirect());
    assert!(response.end_session);
    assert_eq!(response.location(), Some("/login/?next=%2Fbilling%2F"));
}

#[test]
fn insecure_requests_redirect_or_fail() {
    let request = get("/checkout/").with_query_param("step", "2");

    let redirecting = Guard::ssl_required(SslOptions::default());
    let response = redirecting.dispatch(&request, next).unwrap();
    assert_eq!(response.status, 301);
    assert_eq!(
        response.location(),
        Some("https://example.com/checkout/?step=2")
    );

    let strict = Guard::ssl_required(SslOptions {
        redirect_to_ssl: false,
        debug: false,
    });
    let response = strict.dispatch(&request, next).unwrap();
    assert_eq!(response.status, 400);
    assert!(response.location().is_none());

    let secure = request.clone().with_secure(true);
    assert_eq!(strict.dispatch(&secure, next).unwrap().body, "next");
}

#[test]
fn pass_or_redirect_flag_chooses_branch_for_anonymous_users() {
    let is_beta = predicate(|r: &Request| r.principal().is_some_and(|p| p.is_member("beta")));

    let redirecting = Guard::pass_or_redirect("beta", is_beta.clone(), "/waitlist/", true).unwrap();
    let anon = get("/beta/");
    assert_eq!(
        redirecting.dispatch(&anon, next).unwrap().location(),
        Some("/waitlist/")
    );

    let denying = Guard::pass_or_redirect("beta", is_beta, "/waitlist/", false).unwrap();
    let err = denying.dispatch(&anon, next).unwrap_err();
    assert_eq!(
        err.violation().unwrap().kind,
        ViolationKind::TestFailed {
            test: "beta".to_string()
        }
    );
}

struct NonEmpty(FormKwargs);

impl Form for NonEmpty {
    fn is_valid(&mut self) -> bool {
        let field = format!("{}-value", self.0.prefix);
        self.0
            .data
            .as_ref()
            .and_then(|d| d.get(&field))
            .and_then(|v| v.as_str())
            .is_some_and(|s| !s.is_empty())
    }
}

struct Outcome;

impl FormsHandler for Outcome {
    fn forms_valid(&self, _: &Request, forms: &Forms) -> Result<Response, Error> {
        Ok(Response::redirect(format!("/done/?forms={}", forms.len())))
    }

    fn forms_invalid(&self, _: &Request, _: &Forms) -> Result<Response, Error> {
        Ok(Response::bad_request())
    }
}

#[test]
fn one_invalid_form_fails_the_submission() {
    let forms = MultipleForms::new()
        .form("profile", FormClass::new(NonEmpty))
        .form("address", FormClass::new(NonEmpty));

    let half = Request::new("req-forms", Method::Post, "/settings/")
        .with_form_field("profile-value", "Alice")
        .with_form_field("address-value", "");
    assert_eq!(forms.post(&half, &Outcome).unwrap().status, 400);

    let full = half.with_form_field("address-value", "1 Main St");
    let response = forms.post(&full, &Outcome).unwrap();
    assert_eq!(response.location(), Some("/done/?forms=2"));
}

#[test]
fn guarded_form_submission() {
    let guard = Guard::login_required().redirect_to_login_on_failure("/login/").unwrap();
    let forms = MultipleForms::new().form("profile", FormClass::new(NonEmpty));

    let anon = Request::new("req-forms", Method::Post, "/settings/")
        .with_form_field("profile-value", "x");
    let response = guard
        .dispatch(&anon, |r: &Request| -> Result<Response, Error> { forms.post(r, &Outcome) })
        .unwrap();
    assert_eq!(response.location(), Some("/login/?next=%2Fsettings%2F"));
}
