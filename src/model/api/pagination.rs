use rocket::{
    http::Status,
    request::{self, FromRequest, Request},
};

pub const DEFAULT_PAGE_SIZE: u64 = 10;
pub const MAX_PAGE_SIZE: u64 = 100;

/// `page_num` (from 1) and `page_size` query parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    page_num: u64,
    page_size: u64,
}

impl Pagination {
    pub fn new(page_num: u64, page_size: u64) -> Option<Self> {
        (page_num >= 1 && (1..=MAX_PAGE_SIZE).contains(&page_size)).then_some(Self {
            page_num,
            page_size,
        })
    }

    pub fn page_size(&self) -> u64 {
        self.page_size
    }

    pub fn skip(&self) -> u64 {
        (self.page_num - 1).saturating_mul(self.page_size)
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for Pagination {
    type Error = ();

    async fn from_request(req: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        let page_num = req.query_value::<u64>("page_num").unwrap_or(Ok(1));
        let page_size = req
            .query_value::<u64>("page_size")
            .unwrap_or(Ok(DEFAULT_PAGE_SIZE));
        match (page_num, page_size) {
            (Ok(page_num), Ok(page_size)) => match Self::new(page_num, page_size) {
                Some(pagination) => request::Outcome::Success(pagination),
                None => request::Outcome::Error((Status::BadRequest, ())),
            },
            _ => request::Outcome::Error((Status::BadRequest, ())),
        }
    }
}
