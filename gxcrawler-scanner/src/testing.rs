// Mock server fixtures shared by the session, grid and crawler tests.

use crate::decoder::tag;
use crate::session::Credentials;
use serde_json::{Map, Value, json};
use wiremock::matchers::{method, path};
use wiremock::{Match, Mock, MockServer, Request, ResponseTemplate};

pub const KB_NAME: &str = "SalesKB";
pub const MAIN_TOKEN: &str = "main-token-1";
pub const ACTIVITY_TOKEN: &str = "activity-token-1";
pub const SESSION_COOKIE: &str = "GX_SESSION_ID=s-42";

/// Query string contains the given text.
pub struct QueryContains(pub &'static str);

impl Match for QueryContains {
    fn matches(&self, request: &Request) -> bool {
        request.url.query().is_some_and(|q| q.contains(self.0))
    }
}

/// Query string is exactly the given text.
pub struct QueryEquals(pub &'static str);

impl Match for QueryEquals {
    fn matches(&self, request: &Request) -> bool {
        request.url.query() == Some(self.0)
    }
}

pub struct NoQuery;

impl Match for NoQuery {
    fn matches(&self, request: &Request) -> bool {
        request.url.query().is_none()
    }
}

/// Grid refresh request for one page number.
pub struct GridPage(pub u32);

impl Match for GridPage {
    fn matches(&self, request: &Request) -> bool {
        let prefix = format!("gxajaxGridRefresh_Activitygrid,10,{},", self.0);
        request.url.query().is_some_and(|q| q.starts_with(&prefix))
    }
}

pub fn base_url(server: &MockServer) -> String {
    format!("{}/gx", server.uri())
}

pub fn credentials(url: &str) -> Credentials {
    Credentials {
        user: "admin".to_string(),
        password: "s3cret".to_string(),
        url: url.to_string(),
        kb_name: KB_NAME.to_string(),
    }
}

pub fn landing_html() -> String {
    format!(
        r#"<html><body>
            <form name="MAINFORM" method="post">
                <div><input type="hidden" name="GXKey" value="k"/></div>
                <div><input type="hidden" name="GXState" value='{{"GX_AUTH_W0010MAINLOGIN":"{}"}}'/></div>
            </form>
        </body></html>"#,
        MAIN_TOKEN
    )
}

pub fn activity_html() -> String {
    format!(
        r#"<html><body><script>gx.ajax.saveJsonResponse({{"GX_AUTH_ACTIVITY":"{}"}});</script></body></html>"#,
        ACTIVITY_TOKEN
    )
}

pub async fn mount_landing_page(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/gx/main.aspx"))
        .and(NoQuery)
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/html")
                .set_body_string(landing_html()),
        )
        .mount(server)
        .await;
}

pub async fn mount_login_and_dashboard(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/gx/main.aspx"))
        .and(QueryContains("gxfullajaxEvt"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("set-cookie", format!("{}; Path=/", SESSION_COOKIE).as_str())
                .set_body_string(r#"{"gxCommands":[{"redirect":{"url":"/gx/dashboard.aspx"}}]}"#),
        )
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/gx/dashboard.aspx"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/html")
                .set_body_string("<html><body>dashboard</body></html>"),
        )
        .mount(server)
        .await;
}

pub async fn mount_activity_page(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/gx/activity.aspx"))
        .and(QueryEquals(KB_NAME))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/html")
                .set_body_string(activity_html()),
        )
        .mount(server)
        .await;
}

pub async fn mount_handshake(server: &MockServer) {
    mount_landing_page(server).await;
    mount_login_and_dashboard(server).await;
    mount_activity_page(server).await;
}

pub fn revision_row(values: &mut Map<String, Value>, row: usize, build: u64) {
    values.insert(tag("vREVISIONDATE_", row), json!("10/26/20 11:51 AM"));
    values.insert(tag("vSECONDS_", row), json!(row * 3));
    values.insert(tag("vUSER_", row), json!("ana"));
    values.insert(tag("vCOMMENT_", row), json!(format!("change {}", build)));
    values.insert(tag("vREVISIONNAME_", row), json!(format!("Revision {}", build)));
    values.insert(tag("vOPERATION_", row), json!("Commit"));
    values.insert(tag("vBUILD_", row), json!(build.to_string()));
}

/// Grid refresh response holding one row per build, in order.
pub fn grid_page(builds: &[u64]) -> Value {
    let mut values = Map::new();
    for (i, build) in builds.iter().enumerate() {
        revision_row(&mut values, i + 1, *build);
    }
    json!({
        "gxGrids": [{"id": 45, "Count": builds.len()}],
        "gxValues": [values]
    })
}

pub fn empty_grid_page() -> Value {
    json!({ "gxGrids": [{"id": 45, "Count": 0}], "gxValues": [{}] })
}

pub fn objects_response(count: usize) -> Value {
    let mut values = Map::new();
    for i in 1..=count {
        values.insert(tag("W0077vTYPE_", i), json!("Procedure"));
        values.insert(tag("W0077vNAMEAUX_", i), json!(format!("Proc{}", i)));
        values.insert(tag("W0077vENTITYGUID_", i), json!(format!("guid-{}", i)));
        values.insert(tag("W0077vENTITYID_", i), json!(i));
        values.insert(tag("W0077vOBJOPERATION_", i), json!("Modified"));
    }
    json!({ "gxValues": [{}, values] })
}

pub async fn mount_grid_page(server: &MockServer, page: u32, body: Value, expected_calls: u64) {
    Mock::given(method("GET"))
        .and(path("/gx/activity.aspx"))
        .and(GridPage(page))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .expect(expected_calls)
        .mount(server)
        .await;
}

pub async fn mount_objects(server: &MockServer, count: usize) {
    Mock::given(method("POST"))
        .and(path("/gx/activity.aspx"))
        .and(QueryContains("gxfullajaxEvt"))
        .respond_with(ResponseTemplate::new(200).set_body_json(objects_response(count)))
        .mount(server)
        .await;
}
