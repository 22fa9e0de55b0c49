use crate::crawler::{CrawlEvent, ProgressCallback};
use crate::decoder::{decode_row, grid_count, grid_rows};
use crate::error::Result;
use crate::record::{DateRange, PageResult, RevisionRecord};
use crate::session::{Session, SessionClient};
use tracing::{debug, info};

/// Rows requested per grid page.
pub const PAGE_SIZE: u32 = 10;

/// Last page the paginator will ask for.
pub const MAX_PAGES: u32 = 1000;

/// Forward-only walk over the activity grid for one date range.
///
/// Each call to [`GridPaginator::next_page`] issues the grid request for the
/// next page and, for every row on it, the per-revision objects request. The
/// walk ends at the first empty page, at [`MAX_PAGES`], or at the first error.
pub struct GridPaginator<'a> {
    client: &'a SessionClient,
    session: &'a Session,
    range: DateRange,
    next_page: u32,
    finished: bool,
    progress_callback: Option<ProgressCallback>,
}

impl<'a> GridPaginator<'a> {
    pub fn new(client: &'a SessionClient, session: &'a Session, range: DateRange) -> Self {
        Self {
            client,
            session,
            range,
            next_page: 1,
            finished: false,
            progress_callback: None,
        }
    }

    #[cfg(test)]
    fn starting_at(
        client: &'a SessionClient,
        session: &'a Session,
        range: DateRange,
        page: u32,
    ) -> Self {
        Self {
            next_page: page,
            ..Self::new(client, session, range)
        }
    }

    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    fn emit(&self, event: CrawlEvent) {
        if let Some(ref callback) = self.progress_callback {
            callback(event);
        }
    }

    pub async fn next_page(&mut self) -> Result<Option<PageResult>> {
        if self.finished {
            return Ok(None);
        }
        if self.next_page > MAX_PAGES {
            info!("Reached page ceiling of {}", MAX_PAGES);
            self.finished = true;
            return Ok(None);
        }

        match self.fetch_page(self.next_page).await {
            Ok(Some(page)) => {
                self.next_page += 1;
                Ok(Some(page))
            }
            other => {
                self.finished = true;
                other
            }
        }
    }

    async fn fetch_page(&self, page: u32) -> Result<Option<PageResult>> {
        let body = self.client.refresh_grid(self.session, page, &self.range).await?;
        let count = grid_count(&body);
        if count == 0 {
            debug!("Grid page {} is empty", page);
            return Ok(None);
        }

        self.emit(CrawlEvent::PageFetched { page, rows: count });
        let values = grid_rows(&body)?;

        let mut records = Vec::with_capacity(count);
        for row in 1..=count {
            let mut record: RevisionRecord = decode_row(values, row)?;
            record.objects = self
                .client
                .fetch_revision_objects(self.session, &record, row)
                .await?;

            self.emit(CrawlEvent::RecordDecoded {
                page,
                row,
                build: record.build.clone(),
                objects: record.objects.len(),
            });
            records.push(record);
        }

        debug!("Grid page {} decoded {} revisions", page, records.len());
        Ok(Some(PageResult { page, records }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CrawlError;
    use crate::testing::{self, GridPage};
    use std::sync::{Arc, Mutex};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn ready_session(server: &MockServer) -> (Session, SessionClient) {
        testing::mount_handshake(server).await;
        let credentials = testing::credentials(&testing::base_url(server));
        let mut session = Session::new(&credentials.url).unwrap();
        let client = SessionClient::new(credentials, &session).unwrap();
        client.handshake(&mut session, |_| {}).await.unwrap();
        (session, client)
    }

    #[tokio::test]
    async fn test_pagination_stops_at_empty_page() {
        let server = MockServer::start().await;
        let (session, client) = ready_session(&server).await;

        let first: Vec<u64> = (1..=10).collect();
        let second: Vec<u64> = (11..=20).collect();
        testing::mount_grid_page(&server, 1, testing::grid_page(&first), 1).await;
        testing::mount_grid_page(&server, 2, testing::grid_page(&second), 1).await;
        testing::mount_grid_page(&server, 3, testing::empty_grid_page(), 1).await;
        testing::mount_grid_page(&server, 4, testing::grid_page(&[99]), 0).await;
        testing::mount_objects(&server, 2).await;

        let mut paginator = GridPaginator::new(&client, &session, DateRange::today());
        let mut pages = Vec::new();
        while let Some(page) = paginator.next_page().await.unwrap() {
            pages.push(page);
        }

        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].page, 1);
        assert_eq!(pages[1].page, 2);
        assert_eq!(pages[0].records.len(), 10);
        assert_eq!(pages[0].records[0].build, "1");
        assert_eq!(pages[1].records[9].build, "20");
        assert_eq!(pages[1].records[9].objects.len(), 2);
        assert_eq!(pages[0].object_count(), 20);
        assert!(paginator.is_finished());

        // exhausted walks never touch the server again
        assert!(paginator.next_page().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_walk_stops_at_page_ceiling() {
        let server = MockServer::start().await;
        let (session, client) = ready_session(&server).await;

        testing::mount_grid_page(&server, MAX_PAGES, testing::grid_page(&[5]), 1).await;
        testing::mount_grid_page(&server, MAX_PAGES + 1, testing::grid_page(&[6]), 0).await;
        testing::mount_objects(&server, 1).await;

        let mut paginator =
            GridPaginator::starting_at(&client, &session, DateRange::today(), MAX_PAGES);
        let last = paginator.next_page().await.unwrap().unwrap();
        assert_eq!(last.page, MAX_PAGES);
        assert_eq!(last.records[0].build, "5");
        assert!(!paginator.is_finished());

        assert!(paginator.next_page().await.unwrap().is_none());
        assert!(paginator.is_finished());
    }

    #[tokio::test]
    async fn test_missing_grid_count_ends_walk() {
        let server = MockServer::start().await;
        let (session, client) = ready_session(&server).await;

        Mock::given(method("GET"))
            .and(path("/gx/activity.aspx"))
            .and(GridPage(1))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"gxValues":[{}]}"#))
            .expect(1)
            .mount(&server)
            .await;

        let mut paginator = GridPaginator::new(&client, &session, DateRange::today());
        assert!(paginator.next_page().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_bad_row_aborts_page() {
        let server = MockServer::start().await;
        let (session, client) = ready_session(&server).await;

        let mut body = testing::grid_page(&[7, 8]);
        body["gxValues"][0]
            .as_object_mut()
            .unwrap()
            .remove("vUSER_0002");
        testing::mount_grid_page(&server, 1, body, 1).await;
        testing::mount_grid_page(&server, 2, testing::empty_grid_page(), 0).await;
        testing::mount_objects(&server, 1).await;

        let mut paginator = GridPaginator::new(&client, &session, DateRange::today());
        let result = paginator.next_page().await;
        assert!(matches!(result, Err(CrawlError::DecodeError(_))));
        assert!(paginator.is_finished());
        assert!(paginator.next_page().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_progress_events_follow_row_order() {
        let server = MockServer::start().await;
        let (session, client) = ready_session(&server).await;

        testing::mount_grid_page(&server, 1, testing::grid_page(&[30, 31, 32]), 1).await;
        testing::mount_grid_page(&server, 2, testing::empty_grid_page(), 1).await;
        testing::mount_objects(&server, 1).await;

        let events: Arc<Mutex<Vec<CrawlEvent>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        let mut paginator = GridPaginator::new(&client, &session, DateRange::today())
            .with_progress_callback(Arc::new(move |event: CrawlEvent| sink.lock().unwrap().push(event)));

        while paginator.next_page().await.unwrap().is_some() {}

        let events = events.lock().unwrap();
        let builds: Vec<String> = events
            .iter()
            .filter_map(|e| match e {
                CrawlEvent::RecordDecoded { build, .. } => Some(build.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(builds, vec!["30", "31", "32"]);
        assert!(matches!(events[0], CrawlEvent::PageFetched { page: 1, rows: 3 }));
    }
}
