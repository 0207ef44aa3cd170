//! Data center locations

use super::{ApiError, Client};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub metro: String,
    #[serde(default)]
    pub site_code: String,
    #[serde(default)]
    pub market: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub latitude: f64,
    #[serde(default)]
    pub longitude: f64,
    #[serde(default)]
    pub products: LocationProducts,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LocationProducts {
    #[serde(default)]
    pub mcr: bool,
    #[serde(default)]
    pub mcr2: Vec<i64>,
    /// Port speeds in Mbps
    #[serde(default)]
    pub megaport: Vec<i64>,
    #[serde(default)]
    pub mve: Vec<serde_json::Value>,
}

impl Location {
    pub fn mcr_available(&self) -> bool {
        self.products.mcr || !self.products.mcr2.is_empty()
    }

    pub fn mve_available(&self) -> bool {
        !self.products.mve.is_empty()
    }
}

/// How a single location is looked up
#[derive(Debug, Clone, PartialEq)]
pub enum LocationQuery {
    Id(i64),
    Name(String),
    SiteCode(String),
}

impl LocationQuery {
    fn matches(&self, location: &Location) -> bool {
        match self {
            LocationQuery::Id(id) => location.id == *id,
            LocationQuery::Name(name) => location.name == *name,
            LocationQuery::SiteCode(code) => location.site_code.eq_ignore_ascii_case(code),
        }
    }
}

impl std::fmt::Display for LocationQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LocationQuery::Id(id) => write!(f, "location with id {}", id),
            LocationQuery::Name(name) => write!(f, "location named \"{}\"", name),
            LocationQuery::SiteCode(code) => write!(f, "location with site code \"{}\"", code),
        }
    }
}

pub struct LocationsApi<'a> {
    client: &'a Client,
}

impl<'a> LocationsApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    /// GET /v2/locations
    pub async fn list(&self) -> Result<Vec<Location>, ApiError> {
        self.client.get("/v2/locations").await
    }

    /// Finds one location by id, name or site code
    pub async fn find(&self, query: &LocationQuery) -> Result<Location, ApiError> {
        self.list()
            .await?
            .into_iter()
            .find(|l| query.matches(l))
            .ok_or_else(|| ApiError::NotFound(query.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_helpers::{create_test_client, mock_token};
    use mockito::Server;

    const LOCATIONS: &str = r#"{"message":"ok","data":[
        {"id":2,"name":"Equinix SY3","country":"Australia","metro":"Sydney","siteCode":"sy3",
         "market":"AU","status":"Active","latitude":-33.92,"longitude":151.18,
         "products":{"mcr":true,"mcr2":[1000,2500],"megaport":[1,10,100],"mve":[{"sizes":["SMALL"]}]}},
        {"id":5,"name":"Global Switch Sydney","country":"Australia","metro":"Sydney","siteCode":"gs1",
         "market":"AU","status":"Active","latitude":-33.87,"longitude":151.19,
         "products":{"megaport":[1,10]}}
    ]}"#;

    #[tokio::test]
    async fn find_by_each_key() {
        let mut server = Server::new_async().await;
        let _token = mock_token(&mut server).await;
        let _mock = server
            .mock("GET", "/v2/locations")
            .with_body(LOCATIONS)
            .expect(3)
            .create_async()
            .await;

        let client = create_test_client(&server.url());
        let api = client.locations();

        let by_id = api.find(&LocationQuery::Id(5)).await.unwrap();
        assert_eq!(by_id.name, "Global Switch Sydney");
        assert!(!by_id.mcr_available());
        assert!(!by_id.mve_available());

        let by_name = api
            .find(&LocationQuery::Name("Equinix SY3".into()))
            .await
            .unwrap();
        assert_eq!(by_name.id, 2);
        assert!(by_name.mcr_available());
        assert!(by_name.mve_available());
        assert_eq!(by_name.products.megaport, vec![1, 10, 100]);

        let by_code = api
            .find(&LocationQuery::SiteCode("SY3".into()))
            .await
            .unwrap();
        assert_eq!(by_code.id, 2);
    }

    #[tokio::test]
    async fn missing_location_is_not_found() {
        let mut server = Server::new_async().await;
        let _token = mock_token(&mut server).await;
        let _mock = server
            .mock("GET", "/v2/locations")
            .with_body(LOCATIONS)
            .create_async()
            .await;

        let client = create_test_client(&server.url());
        let err = client
            .locations()
            .find(&LocationQuery::Id(99))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "location with id 99 not found");
    }
}
