mod common;

use common::{image, init_logging, FakeCarousel, FakeDriver, FakePage};
use gallery_engine::{
    BrowserDriver, ClassStrategy, DomIdStrategy, LocatorResolver, PositionalStrategy, ResolveError, RootStrategy,
    WidgetIdentity, WidgetSelectors,
};
use pretty_assertions::assert_eq;

fn two_galleries() -> FakePage {
    FakePage::with(vec![
        FakeCarousel::of(&[image("a1"), image("a2")]).id("comp-mfqwrx08__item-a"),
        FakeCarousel::of(&[image("b1"), image("b2")]).id("comp-mfqwrx08__item-b"),
    ])
}

#[tokio::test]
async fn discovery_skips_background_containers() {
    init_logging();
    let mut page = two_galleries();
    page.technical_roots = vec!["bgLayers_comp-1".to_string(), "bgMedia_comp-2".to_string()];
    let driver = FakeDriver::new(page);
    let resolver = LocatorResolver::new(WidgetSelectors::default());

    let widgets = resolver.discover(&driver).await.unwrap();

    assert_eq!(
        widgets,
        vec![
            WidgetIdentity::new(0, Some("comp-mfqwrx08__item-a".to_string())),
            WidgetIdentity::new(1, Some("comp-mfqwrx08__item-b".to_string())),
        ]
    );
}

#[tokio::test]
async fn discovery_falls_back_to_class_selector() {
    init_logging();
    let mut page = two_galleries();
    page.class_only = true;
    let driver = FakeDriver::new(page);
    let resolver = LocatorResolver::new(WidgetSelectors::default());

    let widgets = resolver.discover(&driver).await.unwrap();
    assert_eq!(widgets.len(), 2);

    let handle = resolver.resolve(&driver, &widgets[1]).await.unwrap();
    assert_eq!(
        driver.get_attribute(handle.root, "id").await.unwrap().as_deref(),
        Some("comp-mfqwrx08__item-b")
    );
}

#[tokio::test]
async fn resolve_finds_root_and_controls() {
    init_logging();
    let driver = FakeDriver::new(two_galleries());
    let resolver = LocatorResolver::new(WidgetSelectors::default());
    let identity = WidgetIdentity::new(1, Some("comp-mfqwrx08__item-b".to_string()));

    let handle = resolver.resolve(&driver, &identity).await.unwrap();

    assert_eq!(handle.identity, identity);
    assert!(handle.counter.is_some());
    assert!(handle.next.is_some());
    assert_eq!(
        driver.get_attribute(handle.root, "id").await.unwrap().as_deref(),
        Some("comp-mfqwrx08__item-b")
    );
}

#[tokio::test]
async fn identities_without_dom_id_resolve_by_position() {
    init_logging();
    let driver = FakeDriver::new(FakePage::with(vec![
        FakeCarousel::of(&[image("a1")]).without_next(),
        FakeCarousel::of(&[image("b1"), image("b2")]),
    ]));
    let resolver = LocatorResolver::new(WidgetSelectors::default());

    let first = resolver
        .resolve(&driver, &WidgetIdentity::new(0, None))
        .await
        .unwrap();
    let second = resolver
        .resolve(&driver, &WidgetIdentity::new(1, None))
        .await
        .unwrap();

    assert_ne!(first.root, second.root);
    assert_eq!(first.next, None);
    assert!(second.next.is_some());
}

#[tokio::test]
async fn unsupported_selector_counts_as_a_miss() {
    init_logging();
    let mut page = two_galleries();
    page.no_has_support = true;
    let driver = FakeDriver::new(page);
    let strategies: Vec<Box<dyn RootStrategy>> = vec![
        Box::new(gallery_engine::AncestorStrategy),
        Box::new(PositionalStrategy),
    ];
    let resolver = LocatorResolver::with_strategies(WidgetSelectors::default(), strategies);

    let handle = resolver
        .resolve(&driver, &WidgetIdentity::new(0, None))
        .await
        .unwrap();
    assert!(handle.next.is_some());
}

#[tokio::test]
async fn mismatched_dom_id_is_not_found() {
    init_logging();
    let driver = FakeDriver::new(two_galleries());
    let strategies: Vec<Box<dyn RootStrategy>> =
        vec![Box::new(ClassStrategy), Box::new(PositionalStrategy)];
    let resolver = LocatorResolver::with_strategies(WidgetSelectors::default(), strategies);
    let identity = WidgetIdentity::new(0, Some("comp-gone".to_string()));

    let result = resolver.resolve(&driver, &identity).await;
    assert_eq!(result, Err(ResolveError::NotFound));
}

#[tokio::test]
async fn missing_widget_is_not_found() {
    init_logging();
    let driver = FakeDriver::new(two_galleries());
    let resolver = LocatorResolver::new(WidgetSelectors::default());

    let result = resolver.resolve(&driver, &WidgetIdentity::new(5, None)).await;
    assert_eq!(result, Err(ResolveError::NotFound));
}

#[tokio::test]
async fn session_failure_is_reported() {
    init_logging();
    let mut page = two_galleries();
    page.fail_after_calls = Some(0);
    let driver = FakeDriver::new(page);
    let resolver = LocatorResolver::new(WidgetSelectors::default());

    let result = resolver.resolve(&driver, &WidgetIdentity::new(0, None)).await;
    assert!(matches!(result, Err(ResolveError::Session(_))));
}

#[tokio::test]
async fn handles_are_fresh_after_rerender() {
    init_logging();
    let driver = FakeDriver::new(two_galleries());
    let resolver = LocatorResolver::new(WidgetSelectors::default());
    let identity = WidgetIdentity::new(0, Some("comp-mfqwrx08__item-a".to_string()));

    let before = resolver.resolve(&driver, &identity).await.unwrap();
    driver.rerender_next(0);
    let after = resolver.resolve(&driver, &identity).await.unwrap();

    assert_eq!(before.root, after.root);
    assert_ne!(before.next, after.next);
    let stale = before.next.unwrap();
    assert_eq!(
        driver.click(stale).await,
        Err(gallery_engine::DriverError::StaleReference)
    );
}

#[tokio::test]
async fn resolve_retries_after_a_rerendered_container() {
    init_logging();
    let driver = FakeDriver::new(FakePage::with(vec![
        FakeCarousel::of(&[image("a1"), image("a2")]).stale_on_lookup(1),
    ]));
    let resolver = LocatorResolver::new(WidgetSelectors::default());

    let handle = resolver
        .resolve(&driver, &WidgetIdentity::new(0, None))
        .await
        .unwrap();

    assert!(handle.counter.is_some());
    assert!(handle.next.is_some());
}

#[tokio::test]
async fn resolve_gives_up_after_repeated_rerenders() {
    init_logging();
    let mut carousel = FakeCarousel::of(&[image("a1"), image("a2")]);
    for attempt in 1..=3 {
        carousel = carousel.stale_on_lookup(attempt);
    }
    let driver = FakeDriver::new(FakePage::with(vec![carousel]));
    let resolver = LocatorResolver::new(WidgetSelectors::default()).with_stale_retries(2);

    let result = resolver.resolve(&driver, &WidgetIdentity::new(0, None)).await;
    assert_eq!(result, Err(ResolveError::NotFound));
}

#[tokio::test]
async fn dom_ids_with_quotes_and_backslashes_resolve() {
    init_logging();
    let odd_ids = [r#"comp-a\b"#, r#"comp-"quoted""#, "comp-trailing\\"];
    let driver = FakeDriver::new(FakePage::with(
        odd_ids
            .iter()
            .map(|id| FakeCarousel::of(&[image("odd")]).id(id))
            .collect(),
    ));
    let strategies: Vec<Box<dyn RootStrategy>> = vec![Box::new(DomIdStrategy)];
    let resolver = LocatorResolver::with_strategies(WidgetSelectors::default(), strategies);

    for (ordinal, id) in odd_ids.iter().enumerate() {
        let identity = WidgetIdentity::new(ordinal, Some(id.to_string()));
        let handle = resolver.resolve(&driver, &identity).await.unwrap();
        assert_eq!(
            driver.get_attribute(handle.root, "id").await.unwrap().as_deref(),
            Some(*id)
        );
    }
}
