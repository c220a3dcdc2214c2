use std::{cell::RefCell, rc::Rc, time::Duration};

use eddy_core::{
    Child, Component, Error,
    element::{Element, element, portal, raw_markup},
    host::SVG_NAMESPACE,
};
use futures::channel::oneshot;

use crate::{DomApp, DomError, Mutation, render_to_string};

/// An async function component that renders its children once `gate` fires.
fn gated(name: &'static str) -> (oneshot::Sender<()>, Component) {
    let (gate, wait) = oneshot::channel::<()>();
    let wait = Rc::new(RefCell::new(Some(wait)));
    let component = Component::async_function(name, move |props, _ctx| {
        let wait = wait.borrow_mut().take();
        async move {
            if let Some(wait) = wait {
                let _ = wait.await;
            }
            Ok(Child::List(props.children().to_vec()))
        }
    });
    (gate, component)
}

/// Shows "loading" once `timer` fires unless the children finish first.
fn suspense(timer: Component) -> Component {
    Component::async_generator("Suspense", move |ctx| {
        let timer = timer.clone();
        async move {
            while let Some(props) = ctx.next_props().await {
                ctx.emit(timer.element().child("loading")).await?;
                ctx.emit(Child::List(props.children().to_vec())).await?;
            }
            Ok(())
        }
    })
}

#[test]
fn renders_static_markup() {
    let html = render_to_string(
        element("ul")
            .prop("className", "menu")
            .child(element("li").child("Tea & cake"))
            .child(element("li").child(element("br"))),
    )
    .unwrap();
    assert_eq!(
        html,
        "<ul class=\"menu\"><li>Tea &amp; cake</li><li><br></li></ul>"
    );
}

#[test]
fn render_to_string_waits_for_timers() {
    let late = Component::async_function("Late", |_, _| async {
        smol::Timer::after(Duration::from_millis(5)).await;
        Ok(element("em").child("late"))
    });
    let html = render_to_string(element("p").child(late.element())).unwrap();
    assert_eq!(html, "<p><em>late</em></p>");
}

#[test]
fn render_to_string_reports_component_failures() {
    let failing = Component::async_function("Failing", |_, _| async {
        Err::<Element, _>(anyhow::anyhow!("boom"))
    });
    let error = render_to_string(failing.element()).unwrap_err();
    assert!(matches!(error, DomError::Render(Error::Component { .. })));
    assert_eq!(error.to_string(), "component `Failing` failed: boom");
}

#[test]
fn suspense_shows_fallback_until_content_arrives() {
    let mut app = DomApp::new();
    let (timeout, timer) = gated("Timer");
    let (loaded, content) = gated("Content");
    let render = app.render(
        suspense(timer)
            .element()
            .child(content.element().child(element("article").child("story"))),
    );
    app.run_until_stalled();
    assert!(!render.is_settled());
    assert_eq!(app.html(), "");

    timeout.send(()).unwrap();
    app.run_until_stalled();
    assert!(render.is_settled());
    assert_eq!(app.html(), "loading");

    loaded.send(()).unwrap();
    app.run_until_stalled();
    assert_eq!(app.html(), "<article>story</article>");
}

#[test]
fn suspense_skips_fallback_when_content_is_fast() {
    let mut app = DomApp::new();
    let (timeout, timer) = gated("Timer");
    let (loaded, content) = gated("Content");
    let render = app.render(
        suspense(timer)
            .element()
            .child(content.element().child(element("article").child("story"))),
    );
    loaded.send(()).unwrap();
    assert!(app.settle(&render).is_ok());
    assert_eq!(app.html(), "<article>story</article>");

    timeout.send(()).unwrap();
    app.run_until_stalled();
    assert_eq!(app.html(), "<article>story</article>");
}

#[test]
fn settle_reports_stalled_renders() {
    let mut app = DomApp::new();
    let (gate, waiting) = gated("Waiting");
    let render = app.render(waiting.element().child("done"));
    assert!(matches!(app.settle(&render), Err(DomError::Stalled)));
    gate.send(()).unwrap();
    assert!(app.settle(&render).is_ok());
    assert_eq!(app.html(), "done");
}

#[test]
fn updates_touch_only_what_changed() {
    let app = DomApp::builder().record_mutations(true).build();
    let view = |count: i64| {
        element("div")
            .child(element("h1").child("Counter"))
            .child(element("span").prop("data-count", count).child(count))
    };
    app.render(view(1));
    app.renderer().host_mut().take_mutations();

    app.render(view(2));
    let mutations = app.renderer().host_mut().take_mutations();
    assert_eq!(mutations.len(), 2);
    assert!(mutations.iter().any(|mutation| matches!(
        mutation,
        Mutation::SetAttribute { name, value, .. } if name == "data-count" && value == "2"
    )));
    assert!(
        mutations
            .iter()
            .any(|mutation| matches!(mutation, Mutation::SetText(_)))
    );
    assert_eq!(
        app.html(),
        "<div><h1>Counter</h1><span data-count=\"2\">2</span></div>"
    );
}

#[test]
fn svg_subtrees_use_the_svg_namespace() {
    let app = DomApp::new();
    app.render(
        element("svg")
            .prop("viewBox", "0 0 10 10")
            .child(element("circle").prop("r", 4)),
    );
    let document = app.document();
    let svg = document.children(app.root())[0];
    let circle = document.children(svg)[0];
    assert_eq!(document.namespace(svg), Some(SVG_NAMESPACE));
    assert_eq!(document.namespace(circle), Some(SVG_NAMESPACE));
    assert_eq!(
        document.to_html(svg),
        "<svg viewBox=\"0 0 10 10\"><circle r=\"4\"></circle></svg>"
    );
}

#[test]
fn portals_and_raw_markup() {
    let app = DomApp::builder()
        .with_root_tag("main")
        .with_root_id("app")
        .build();
    let aside = app.renderer().host_mut().create_container("aside");
    app.render(
        element("section")
            .child(raw_markup("<hr>"))
            .child(portal(aside, [element("p").child("sidebar")])),
    );
    assert_eq!(app.html(), "<section><hr></section>");
    assert_eq!(app.document().inner_html(aside), "<p>sidebar</p>");
    assert_eq!(
        app.document().to_html(app.root()),
        "<main id=\"app\"><section><hr></section></main>"
    );

    app.unmount();
    assert_eq!(app.html(), "");
    assert_eq!(app.document().inner_html(aside), "");
}

#[test]
fn long_running_apps_do_not_log_mutations() {
    let app = DomApp::new();
    for count in 0..1000 {
        app.render(element("p").child(count));
    }
    assert_eq!(app.html(), "<p>999</p>");
    assert!(!app.document().is_recording());
    assert!(app.renderer().host_mut().take_mutations().is_empty());
}

#[test]
fn remounting_releases_replaced_nodes() {
    let app = DomApp::new();
    for round in 0..50_i64 {
        app.render(element("ul").child(element("li").key(round).child(round)));
    }
    assert_eq!(app.html(), "<ul><li>49</li></ul>");
    // container, list, item and its text
    assert_eq!(app.document().len(), 4);

    app.unmount();
    assert_eq!(app.html(), "");
    assert_eq!(app.document().len(), 1);
}
