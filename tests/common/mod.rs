//! Shared TEI documents and helpers for integration tests.

#![allow(dead_code)]

/// A GROBID-style full-text TEI document.
///
/// The header has a typed DOI, structured authors and an abstract. The back
/// matter nests its `listBibl` inside `div[@type='references']`, the usual
/// GROBID layout, so every entry is reachable through both union branches.
pub const GROBID_TEI: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<TEI xml:space="preserve" xmlns="http://www.tei-c.org/ns/1.0" xmlns:xlink="http://www.w3.org/1999/xlink">
  <teiHeader xml:lang="en">
    <fileDesc>
      <titleStmt>
        <title level="a" type="main">Attention Is All You Need</title>
      </titleStmt>
      <publicationStmt><publisher/><availability status="unknown"><licence/></availability></publicationStmt>
      <sourceDesc>
        <biblStruct>
          <analytic>
            <author>
              <persName><forename type="first">Ashish</forename><surname>Vaswani</surname></persName>
              <email>avaswani@google.com</email>
            </author>
            <author>
              <persName><forename type="first">Noam</forename><surname>Shazeer</surname></persName>
            </author>
            <title level="a" type="main">Attention Is All You Need</title>
          </analytic>
          <monogr>
            <title level="j">Advances in Neural Information Processing Systems</title>
            <imprint><date type="published" when="2017-12-04"/></imprint>
          </monogr>
          <idno type="arXiv">arXiv:1706.03762v5</idno>
          <idno type="DOI">10.5555/3295222.3295349</idno>
        </biblStruct>
      </sourceDesc>
    </fileDesc>
    <profileDesc>
      <abstract>
        <div><p>The dominant sequence transduction models are based on complex recurrent networks.</p></div>
      </abstract>
    </profileDesc>
  </teiHeader>
  <text xml:lang="en">
    <body>
      <div><head>Introduction</head><p>Recurrent neural networks have been firmly established.</p></div>
    </body>
    <back>
      <div type="references">
        <listBibl>
          <biblStruct xml:id="b0">
            <analytic>
              <title level="a" type="main">Layer normalization</title>
              <author><persName><forename type="first">Jimmy</forename><forename type="middle">Lei</forename><surname>Ba</surname></persName></author>
              <author><persName><forename type="first">Jamie</forename><surname>Kiros</surname></persName></author>
            </analytic>
            <monogr>
              <title level="j">arXiv preprint</title>
              <imprint><date type="published" when="2016"/></imprint>
            </monogr>
            <ptr type="url" target="https://arxiv.org/abs/1607.06450"/>
          </biblStruct>
          <biblStruct xml:id="b1">
            <analytic>
              <title level="a" type="main">Long short-term memory</title>
              <author><persName>Sepp Hochreiter</persName></author>
            </analytic>
            <monogr>
              <title level="j">Neural Computation</title>
              <imprint><date>November 1997</date></imprint>
            </monogr>
            <idno>10.1162/neco.1997.9.8.1735</idno>
          </biblStruct>
          <biblStruct xml:id="b2">
            <monogr>
              <title level="m">Deep Learning</title>
              <author><persName><forename>Ian</forename><surname>Goodfellow</surname></persName></author>
              <imprint><date>n.d.</date></imprint>
            </monogr>
          </biblStruct>
        </listBibl>
      </div>
    </back>
  </text>
</TEI>"#;

/// A TEI document with one entry in a bare `listBibl` and one in a
/// `div[@type='references']` without a `listBibl`.
pub const MIXED_BIBLIOGRAPHY_TEI: &str = r#"<TEI xmlns="http://www.tei-c.org/ns/1.0">
  <teiHeader><fileDesc><titleStmt><title>Mixed</title></titleStmt></fileDesc></teiHeader>
  <text>
    <back>
      <listBibl>
        <biblStruct><analytic><title>First entry</title></analytic></biblStruct>
      </listBibl>
      <div type="references">
        <biblStruct><analytic><title>Second entry</title></analytic></biblStruct>
      </div>
      <div type="acknowledgement">
        <biblStruct><analytic><title>Not a reference</title></analytic></biblStruct>
      </div>
    </back>
  </text>
</TEI>"#;

/// Wraps header and text content in a TEI root element.
pub fn tei(header: &str, text: &str) -> String {
    format!(
        r#"<TEI xmlns="http://www.tei-c.org/ns/1.0"><teiHeader>{}</teiHeader><text>{}</text></TEI>"#,
        header, text
    )
}

/// True if any object in `value` has a `null`, `""` or `[]` member.
pub fn has_empty_member(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::Object(map) => map.values().any(|v| {
            v.is_null()
                || v.as_str() == Some("")
                || v.as_array().is_some_and(|a| a.is_empty())
                || has_empty_member(v)
        }),
        serde_json::Value::Array(items) => items.iter().any(has_empty_member),
        _ => false,
    }
}
