use serde_derive::Serialize;

use tmplet::{render, Context, Delimiters, ErrorKind, Template, Tmplet};

#[test]
fn templates_without_directives_render_unchanged() {
    let inputs = vec![
        ("", ""),
        ("hello world", "hello world"),
        (r#"a "quoted" 'string'"#, r#"a "quoted" 'string'"#),
        ("100% of the % signs stay", "100% of the % signs stay"),
        ("<html><body></body></html>", "<html><body></body></html>"),
    ];

    for (input, expected) in inputs {
        assert_eq!(render(input, "{}").unwrap(), expected);
    }
}

#[test]
fn literal_whitespace_is_normalized() {
    // CR, LF and tab each become a single space
    assert_eq!(render("a\r\n\tb", "{}").unwrap(), "a   b");
    assert_eq!(render("line1\nline2", "{}").unwrap(), "line1 line2");
}

#[test]
fn unmatched_start_marker_renders_as_text() {
    assert_eq!(render("a <% b", "{}").unwrap(), "a <% b");
}

#[test]
fn interpolation_works_with_both_delimiter_presets() {
    let payload = r#"{"name": "World"}"#;

    assert_eq!(
        render("Hello <%= name %>!", payload).unwrap(),
        "Hello World!"
    );

    let curly = Tmplet::with_delimiters(Delimiters::curly());
    assert_eq!(
        curly.render("Hello {{= name }}!", payload).unwrap(),
        "Hello World!"
    );
}

#[test]
fn interpolations_render_in_source_order() {
    assert_eq!(
        render("<%= a %>-<%= b %>-<%= a %>", r#"{"a": 1, "b": 2}"#).unwrap(),
        "1-2-1"
    );
}

#[test]
fn expression_evaluation() {
    let payload = r#"{"n": 3, "flag": true}"#;
    let inputs = vec![
        ("<%= 1 + 2 %>", "3"),
        ("<%= 7 / 2 %>", "3.5"),
        ("<%= 6 / 2 %>", "3"),
        ("<%= 7 % 2 %>", "1"),
        ("<%= 2 * 3 - 1 %>", "5"),
        ("<%= (1 + 2) * 3 %>", "9"),
        ("<%= -n %>", "-3"),
        ("<%= !flag %>", "false"),
        ("<%= n > 2 && n < 4 %>", "true"),
        ("<%= n == 3 || false %>", "true"),
        ("<%= 'a' == 'a' %>", "true"),
        ("<%= 'a' + 1 %>", "a1"),
        ("<%= 1 + 'a' %>", "1a"),
        ("<%= 'ab' < 'b' %>", "true"),
    ];

    for (input, expected) in inputs {
        assert_eq!(render(input, payload).unwrap(), expected, "{input}");
    }
}

#[test]
fn number_formatting_drops_the_integral_fraction() {
    assert_eq!(render("<%= price %>", r#"{"price": 3.0}"#).unwrap(), "3");
    assert_eq!(render("<%= price %>", r#"{"price": 3.5}"#).unwrap(), "3.5");
}

#[test]
fn attribute_and_subscript_access() {
    let payload = r#"{"user": {"name": "Ada", "tags": ["x", "y"]}, "idx": 1}"#;
    let inputs = vec![
        ("<%= user.name %>", "Ada"),
        ("<%= user['name'] %>", "Ada"),
        ("<%= user.tags[0] %>", "x"),
        ("<%= user.tags[idx] %>", "y"),
        ("<%= user.tags.length %>", "2"),
        ("<%= user.name.length %>", "3"),
    ];

    for (input, expected) in inputs {
        assert_eq!(render(input, payload).unwrap(), expected, "{input}");
    }
}

#[test]
fn loop_prints_one_marker_per_iteration() {
    assert_eq!(
        render("<% for (var i = 0; i < 3; i++) { print('x'); } %>", "{}").unwrap(),
        "xxx"
    );
    assert_eq!(
        render("<% var i = 0; while (i < 3) { print('x'); i++ } %>", "{}").unwrap(),
        "xxx"
    );
}

#[test]
fn loops_can_span_directives() {
    let tpl = "<ul><% for (var i = 0; i < users.length; i++) { %><li><%= users[i] %></li><% } %></ul>";
    assert_eq!(
        render(tpl, r#"{"users": ["a", "b"]}"#).unwrap(),
        "<ul><li>a</li><li>b</li></ul>"
    );
}

#[test]
fn if_else_across_directives() {
    let tpl = "<% if (ok) { %>yes<% } else { %>no<% } %>";
    assert_eq!(render(tpl, r#"{"ok": true}"#).unwrap(), "yes");
    assert_eq!(render(tpl, r#"{"ok": false}"#).unwrap(), "no");
}

#[test]
fn break_and_continue() {
    assert_eq!(
        render(
            "<% for (var i = 0; i < 5; i++) { if (i == 2) { continue; } print(i); } %>",
            "{}"
        )
        .unwrap(),
        "0134"
    );
    assert_eq!(
        render(
            "<% var i = 0; while (true) { i++; if (i > 2) { break; } print(i); } %>",
            "{}"
        )
        .unwrap(),
        "12"
    );
}

#[test]
fn print_accepts_multiple_arguments() {
    assert_eq!(render("<% print('a', 1, 'b') %>", "{}").unwrap(), "a1b");
    assert_eq!(render("<% print() %>", "{}").unwrap(), "");
}

#[test]
fn variables_persist_across_directives() {
    assert_eq!(render("<% var x = 2 %><%= x * 2 %>", "{}").unwrap(), "4");
}

#[test]
fn assigned_variables_shadow_payload_keys() {
    assert_eq!(render("<% x = 1 %><%= x %>", r#"{"x": 9}"#).unwrap(), "1");
}

#[test]
fn truthiness_follows_the_payload_values() {
    let tpl = "<% if (v) { %>t<% } else { %>f<% } %>";
    let inputs = vec![
        (r#"{"v": 0}"#, "f"),
        (r#"{"v": 1}"#, "t"),
        (r#"{"v": ""}"#, "f"),
        (r#"{"v": "a"}"#, "t"),
        (r#"{"v": []}"#, "f"),
        (r#"{"v": [0]}"#, "t"),
        (r#"{"v": null}"#, "f"),
    ];

    for (payload, expected) in inputs {
        assert_eq!(render(tpl, payload).unwrap(), expected, "{payload}");
    }
}

#[test]
fn bad_payload_is_a_payload_parse_error() {
    let err = render("hi", "{bad").unwrap_err();
    assert!(matches!(err.kind, ErrorKind::PayloadParse(_)));

    let err = render("hi", "[1, 2]").unwrap_err();
    assert!(matches!(err.kind, ErrorKind::PayloadParse(_)));
}

#[test]
fn missing_variable_is_an_undefined_variable_error() {
    let err = render("<%= missing %>", "{}").unwrap_err();
    match err.kind {
        ErrorKind::UndefinedVariable(report) => {
            let report = report.generate_report();
            assert!(report.contains("missing"), "{report}");
        }
        other => panic!("expected an undefined variable error, got {other:?}"),
    }
}

#[test]
fn missing_field_is_a_rendering_error() {
    let err = render("<%= user.wrong %>", r#"{"user": {}}"#).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::RenderingError(_)));

    let err = render("<%= items[4] %>", r#"{"items": [1]}"#).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::RenderingError(_)));
}

#[test]
fn math_on_non_numbers_is_a_rendering_error() {
    let err = render("<%= 1 - 'a' %>", "{}").unwrap_err();
    assert!(matches!(err.kind, ErrorKind::RenderingError(_)));
}

#[test]
fn division_by_zero_is_a_rendering_error() {
    let err = render("<%= 1 / 0 %>", "{}").unwrap_err();
    assert!(matches!(err.kind, ErrorKind::RenderingError(_)));
}

#[test]
fn integer_overflow_is_a_rendering_error() {
    // i64::MIN is a valid payload number; dividing it by -1 must not panic
    let payload = r#"{"n": -9223372036854775808}"#;
    for tpl in ["<%= n / -1 %>", "<%= n % -1 %>", "<%= n - 1 %>", "<%= -n %>"] {
        let err = render(tpl, payload).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::RenderingError(_)), "{tpl}");
    }
}

#[test]
fn compiled_template_can_be_reused() {
    #[derive(Serialize)]
    struct User {
        name: String,
        admin: bool,
    }

    let tpl = Template::new(
        "badge",
        "<%= name %><% if (admin) { %> (admin)<% } %>",
        Delimiters::default(),
    )
    .unwrap();

    let alice = Context::from_serialize(&User {
        name: "Alice".to_string(),
        admin: true,
    })
    .unwrap();
    let bob = Context::from_serialize(&User {
        name: "Bob".to_string(),
        admin: false,
    })
    .unwrap();

    assert_eq!(tpl.render(&alice).unwrap(), "Alice (admin)");
    assert_eq!(tpl.render(&bob).unwrap(), "Bob");
}

#[test]
fn classic_list_template() {
    let tpl = "\
<h1><%= title %></h1>\
<ul><% for (var i = 0; i < items.length; i++) { %>\
<li class=\"<% if (i % 2 == 0) { print('even'); } else { print('odd'); } %>\"><%= items[i].label %></li>\
<% } %></ul>";
    let payload = r#"{
        "title": "Todo",
        "items": [{"label": "write"}, {"label": "test"}, {"label": "ship"}]
    }"#;

    assert_eq!(
        render(tpl, payload).unwrap(),
        "<h1>Todo</h1><ul><li class=\"even\">write</li><li class=\"odd\">test</li><li class=\"even\">ship</li></ul>"
    );
}
