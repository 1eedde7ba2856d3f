//! Built-in templates.
//!
//! Available to `Include` and `Macro` directives by name, and used by the
//! publisher to wrap page bodies into the `ac:layout` template. Context keys
//! are lowercase; directive YAML keys are normalized before rendering.

pub(crate) const TEMPLATES: &[(&str, &str)] = &[
    (
        "ac:status",
        concat!(
            r#"<ac:structured-macro ac:name="status">"#,
            r#"<ac:parameter ac:name="colour">{{ color | default("Grey") }}</ac:parameter>"#,
            r#"<ac:parameter ac:name="title">{{ title }}</ac:parameter>"#,
            r#"<ac:parameter ac:name="subtle">{{ subtle | default(false) }}</ac:parameter>"#,
            r#"</ac:structured-macro>"#,
        ),
    ),
    (
        "ac:box",
        concat!(
            r#"<ac:structured-macro ac:name="{{ name | default("info") }}">"#,
            r#"<ac:parameter ac:name="icon">{{ icon | default(false) }}</ac:parameter>"#,
            r#"{% if title %}<ac:parameter ac:name="title">{{ title }}</ac:parameter>{% endif %}"#,
            r#"<ac:rich-text-body>{{ body }}</ac:rich-text-body>"#,
            r#"</ac:structured-macro>"#,
        ),
    ),
    (
        "ac:toc",
        concat!(
            r#"<ac:structured-macro ac:name="toc">"#,
            r#"<ac:parameter ac:name="printable">{{ printable | default(true) }}</ac:parameter>"#,
            r#"<ac:parameter ac:name="style">{{ style | default("disc") }}</ac:parameter>"#,
            r#"<ac:parameter ac:name="maxLevel">{{ maxlevel | default(7) }}</ac:parameter>"#,
            r#"<ac:parameter ac:name="minLevel">{{ minlevel | default(1) }}</ac:parameter>"#,
            r#"<ac:parameter ac:name="type">{{ type | default("list") }}</ac:parameter>"#,
            r#"<ac:parameter ac:name="outline">{{ outline | default(false) }}</ac:parameter>"#,
            r#"{% if exclude %}<ac:parameter ac:name="exclude">{{ exclude }}</ac:parameter>{% endif %}"#,
            r#"{% if include %}<ac:parameter ac:name="include">{{ include }}</ac:parameter>{% endif %}"#,
            r#"</ac:structured-macro>"#,
        ),
    ),
    (
        "ac:children",
        concat!(
            r#"<ac:structured-macro ac:name="children">"#,
            r#"{% if style %}<ac:parameter ac:name="style">{{ style }}</ac:parameter>{% endif %}"#,
            r#"{% if excerpt %}<ac:parameter ac:name="excerptType">{{ excerpt }}</ac:parameter>{% endif %}"#,
            r#"{% if first %}<ac:parameter ac:name="first">{{ first }}</ac:parameter>{% endif %}"#,
            r#"{% if depth %}<ac:parameter ac:name="depth">{{ depth }}</ac:parameter>{% endif %}"#,
            r#"{% if all %}<ac:parameter ac:name="all">{{ all }}</ac:parameter>{% endif %}"#,
            r#"{% if sort %}<ac:parameter ac:name="sort">{{ sort }}</ac:parameter>{% endif %}"#,
            r#"{% if reverse %}<ac:parameter ac:name="reverse">{{ reverse }}</ac:parameter>{% endif %}"#,
            r#"{% if page %}<ac:parameter ac:name="page"><ac:link><ri:page ri:content-title="{{ page }}"/></ac:link></ac:parameter>{% endif %}"#,
            r#"</ac:structured-macro>"#,
        ),
    ),
    (
        "ac:expand",
        concat!(
            r#"<ac:structured-macro ac:name="expand">"#,
            r#"<ac:parameter ac:name="title">{{ title | default("Click here to expand...") }}</ac:parameter>"#,
            r#"<ac:rich-text-body>{{ body }}</ac:rich-text-body>"#,
            r#"</ac:structured-macro>"#,
        ),
    ),
    (
        "ac:jira:ticket",
        concat!(
            r#"<ac:structured-macro ac:name="jira">"#,
            r#"<ac:parameter ac:name="key">{{ ticket }}</ac:parameter>"#,
            r#"</ac:structured-macro>"#,
        ),
    ),
    ("ac:emoticon", r#"<ac:emoticon ac:name="{{ name }}"/>"#),
    (
        "ac:anchor",
        concat!(
            r#"<ac:structured-macro ac:name="anchor">"#,
            r#"<ac:parameter ac:name="">{{ anchor }}</ac:parameter>"#,
            r#"</ac:structured-macro>"#,
        ),
    ),
    (
        "ac:link:page",
        concat!(
            r#"<ac:link><ri:page ri:content-title="{{ title }}"/>"#,
            r#"<ac:plain-text-link-body><![CDATA[{{ text | default(title) }}]]></ac:plain-text-link-body>"#,
            r#"</ac:link>"#,
        ),
    ),
    (
        "ac:excerpt",
        concat!(
            r#"<ac:structured-macro ac:name="excerpt">"#,
            r#"<ac:parameter ac:name="hidden">{{ hidden | default(false) }}</ac:parameter>"#,
            r#"<ac:rich-text-body><p>{{ excerpt }}</p></ac:rich-text-body>"#,
            r#"</ac:structured-macro>"#,
        ),
    ),
    (
        "ac:layout",
        concat!(
            r#"{% if layout == "article" %}"#,
            r#"<ac:layout><ac:layout-section ac:type="two_right_sidebar">"#,
            r#"<ac:layout-cell>{{ body }}</ac:layout-cell>"#,
            r#"<ac:layout-cell>{{ sidebar }}</ac:layout-cell>"#,
            r#"</ac:layout-section></ac:layout>"#,
            r#"{% else %}{{ body }}{% endif %}"#,
        ),
    ),
    (
        "ac:image",
        concat!(
            r#"<ac:image"#,
            r#"{% if width %} ac:width="{{ width }}"{% endif %}"#,
            r#"{% if height %} ac:height="{{ height }}"{% endif %}"#,
            r#"{% if title %} ac:title="{{ title }}"{% endif %}"#,
            r#"{% if alt %} ac:alt="{{ alt }}"{% endif %}>"#,
            r#"{% if attachment %}<ri:attachment ri:filename="{{ attachment }}"/>{% endif %}"#,
            r#"{% if url %}<ri:url ri:value="{{ url }}"/>{% endif %}"#,
            r#"</ac:image>"#,
        ),
    ),
];

/// Look up a built-in template by name.
pub(crate) fn get(name: &str) -> Option<&'static str> {
    TEMPLATES
        .iter()
        .find(|(template, _)| *template == name)
        .map(|(_, source)| *source)
}
