use megaport::MegaportProvider;
use mockito::{Matcher, Server, ServerGuard};
use tfplug::context::Context;
use tfplug::data_source::ReadDataSourceRequest;
use tfplug::provider::{ConfigureProviderRequest, Provider};
use tfplug::resource::{CreateResourceRequest, DeleteResourceRequest};
use tfplug::types::{AttributePath, Dynamic, DynamicValue};

async fn configured_provider(server: &ServerGuard, accept_purchase_terms: bool) -> MegaportProvider {
    let mut provider = MegaportProvider::new();
    let mut config = provider.schema().conform(&DynamicValue::object());
    for (name, value) in [
        ("environment", "development"),
        ("access_key", "access"),
        ("secret_key", "secret"),
    ] {
        config.set_string(&AttributePath::new(name), value).unwrap();
    }
    config
        .set_string(&AttributePath::new("api_endpoint"), server.url())
        .unwrap();
    config
        .set_string(&AttributePath::new("auth_endpoint"), server.url())
        .unwrap();
    config
        .set_bool(
            &AttributePath::new("accept_purchase_terms"),
            accept_purchase_terms,
        )
        .unwrap();

    let response = provider
        .configure(
            Context::new(),
            ConfigureProviderRequest {
                terraform_version: "1.9.0".to_string(),
                config,
            },
        )
        .await;
    assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
    provider
}

async fn mock_token(server: &mut ServerGuard) -> mockito::Mock {
    server
        .mock("POST", "/oauth2/token")
        .with_header("content-type", "application/json")
        .with_body(r#"{"access_token":"test-token","expires_in":3600,"token_type":"Bearer"}"#)
        .create_async()
        .await
}

#[tokio::test]
async fn ports_data_source_filters_through_the_provider() {
    let mut server = Server::new_async().await;
    let token = mock_token(&mut server).await;
    let _products = server
        .mock("GET", "/v2/products")
        .match_header("authorization", "Bearer test-token")
        .with_body(
            r#"{"message":"ok","data":[
            {"productUid":"port-2","productName":"syd-b","productType":"MEGAPORT",
             "provisioningStatus":"LIVE","portSpeed":10000,"locationId":2},
            {"productUid":"port-1","productName":"syd-a","productType":"MEGAPORT",
             "provisioningStatus":"LIVE","portSpeed":10000,"locationId":2},
            {"productUid":"port-3","productName":"mel-a","productType":"MEGAPORT",
             "provisioningStatus":"LIVE","portSpeed":1000,"locationId":5},
            {"productUid":"mcr-1","productName":"syd-router","productType":"MCR2",
             "provisioningStatus":"LIVE","portSpeed":5000,"locationId":2}
        ]}"#,
        )
        .create_async()
        .await;

    let provider = configured_provider(&server, false).await;
    let data_source = provider.create_data_source("megaport_ports").await.unwrap();

    let schemas = provider.data_source_schemas().await;
    let mut config = schemas["megaport_ports"].conform(&DynamicValue::object());
    config
        .set_list(
            &AttributePath::new("filter"),
            vec![Dynamic::Map(
                [
                    ("name".to_string(), Dynamic::from("name")),
                    (
                        "values".to_string(),
                        Dynamic::List(vec![Dynamic::from("syd-*")]),
                    ),
                ]
                .into(),
            )],
        )
        .unwrap();

    let response = data_source
        .read(
            Context::new(),
            ReadDataSourceRequest {
                type_name: "megaport_ports".to_string(),
                config,
            },
        )
        .await;

    token.assert_async().await;
    assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
    assert_eq!(
        response.state.get_list(&AttributePath::new("uids")).unwrap(),
        vec![Dynamic::from("port-1"), Dynamic::from("port-2")]
    );
}

#[tokio::test]
async fn port_lifecycle_through_the_provider() {
    let mut server = Server::new_async().await;
    let _token = mock_token(&mut server).await;
    let _validate = server
        .mock("POST", "/v3/networkdesign/validate")
        .with_body(r#"{"message":"ok","data":[]}"#)
        .create_async()
        .await;
    let buy = server
        .mock("POST", "/v3/networkdesign/buy")
        .match_body(Matcher::PartialJson(serde_json::json!([{
            "productName": "Sydney Port",
            "productType": "MEGAPORT"
        }])))
        .with_body(r#"{"message":"ok","data":[{"technicalServiceUid":"port-1"}]}"#)
        .create_async()
        .await;
    let _product = server
        .mock("GET", "/v2/product/port-1")
        .with_body(
            r#"{"data":{"productUid":"port-1","productName":"Sydney Port",
            "productType":"MEGAPORT","provisioningStatus":"CONFIGURED","portSpeed":10000,
            "locationId":2,"contractTermMonths":12,"marketplaceVisibility":false,
            "vxcPermitted":true,"companyUid":"co-1"}}"#,
        )
        .create_async()
        .await;
    let _tags = server
        .mock("GET", "/v2/product/port-1/tags")
        .with_body(r#"{"data":{"resourceTags":[]}}"#)
        .create_async()
        .await;
    let cancel = server
        .mock("POST", "/v3/product/port-1/action/CANCEL_NOW")
        .with_body(r#"{"message":"Action [CANCEL_NOW] has been done."}"#)
        .create_async()
        .await;

    let provider = configured_provider(&server, true).await;
    let resource = provider.create_resource("megaport_port").await.unwrap();

    let schemas = provider.resource_schemas().await;
    let mut planned = schemas["megaport_port"].conform(&DynamicValue::object());
    planned
        .set_string(&AttributePath::new("product_name"), "Sydney Port")
        .unwrap();
    for (name, value) in [
        ("port_speed", 10000.0),
        ("location_id", 2.0),
        ("contract_term_months", 12.0),
    ] {
        planned.set_number(&AttributePath::new(name), value).unwrap();
    }
    for name in ["product_uid", "marketplace_visibility", "diversity_zone", "create_date"] {
        planned.mark_unknown(&AttributePath::new(name)).unwrap();
    }

    let created = resource
        .create(
            Context::new(),
            CreateResourceRequest {
                type_name: "megaport_port".to_string(),
                config: planned.clone(),
                planned_state: planned,
            },
        )
        .await;

    buy.assert_async().await;
    assert!(created.diagnostics.is_empty(), "{:?}", created.diagnostics);
    assert_eq!(
        created
            .new_state
            .get_string(&AttributePath::new("provisioning_status"))
            .unwrap(),
        "CONFIGURED"
    );

    let deleted = resource
        .delete(
            Context::new(),
            DeleteResourceRequest {
                type_name: "megaport_port".to_string(),
                prior_state: created.new_state,
            },
        )
        .await;

    cancel.assert_async().await;
    assert!(deleted.diagnostics.is_empty(), "{:?}", deleted.diagnostics);
}

#[tokio::test]
async fn orders_are_refused_without_purchase_terms() {
    let mut server = Server::new_async().await;
    let buy = server
        .mock("POST", "/v3/networkdesign/buy")
        .expect(0)
        .create_async()
        .await;

    let provider = configured_provider(&server, false).await;
    let resource = provider.create_resource("megaport_mcr").await.unwrap();
    let mut planned =
        provider.resource_schemas().await["megaport_mcr"].conform(&DynamicValue::object());
    planned
        .set_string(&AttributePath::new("product_name"), "Edge Router")
        .unwrap();
    for (name, value) in [
        ("port_speed", 5000.0),
        ("location_id", 2.0),
        ("contract_term_months", 1.0),
    ] {
        planned.set_number(&AttributePath::new(name), value).unwrap();
    }

    let response = resource
        .create(
            Context::new(),
            CreateResourceRequest {
                type_name: "megaport_mcr".to_string(),
                config: planned.clone(),
                planned_state: planned,
            },
        )
        .await;

    buy.assert_async().await;
    assert_eq!(response.diagnostics.len(), 1);
    assert_eq!(response.diagnostics[0].summary, "Purchase terms not accepted");
}
