//! End-to-end schema tests: documents in, validated model and queries out.

use std::cell::RefCell;
use std::io::Write;
use std::rc::Rc;

use wiredsl::{AccessedFields, Protocol, ProtocolConfig, SchemaError, Severity};

const FRAMED: &str = r#"
<schema name="Demo" version="2" endian="big">
  <ns name="ns">
    <int name="len" type="uint16"/>
    <message name="Blob" id="1">
      <int name="count" type="uint8"/>
      <data name="payload" lengthPrefix="$count"/>
    </message>
    <frame name="Frame">
      <sync name="Sync">
        <int name="SyncField" type="uint16" defaultValue="0xabcd"/>
      </sync>
      <size name="Size" field="ns.len"/>
      <payload name="Data"/>
    </frame>
  </ns>
</schema>"#;

fn validated(text: &str) -> Protocol {
    let mut protocol = Protocol::new();
    assert!(protocol.parse(text), "{:?}", protocol.diagnostics().messages());
    assert!(protocol.validate(), "{:?}", protocol.diagnostics().messages());
    protocol
}

fn errors(protocol: &Protocol) -> Vec<String> {
    protocol
        .diagnostics()
        .messages()
        .iter()
        .filter(|d| d.severity == Severity::Error)
        .map(|d| d.message.clone())
        .collect()
}

#[test]
fn framed_schema_validates() {
    let protocol = validated(FRAMED);
    let len = protocol.find_field("ns.len").expect("ns.len");
    assert_eq!(len.kind_name(), "int");
    assert_eq!(len.external_ref(), "ns.len");

    let frame = protocol.find_frame("ns.Frame").expect("frame");
    let kinds: Vec<&str> = frame.layers.iter().map(|l| l.kind_name()).collect();
    assert_eq!(kinds, ["sync", "size", "payload"]);
    let schema = protocol.schema().expect("schema");
    let size = frame.layer("Size").and_then(|l| l.field(&schema.fields));
    assert_eq!(size.map(|f| f.name()), Some("len"));

    let blob = protocol.find_message("ns.Blob").expect("message");
    assert_eq!(blob.min_length(&schema.fields), 1);
    assert_eq!(blob.max_length(&schema.fields), usize::MAX);
    assert_eq!(protocol.diagnostics().warning_count(), 0);
}

fn namespace_prefixed(prefix: &str) -> String {
    format!(
        r#"<schema name="Demo">
             <ns name="ns">
               <int name="len" type="uint8"/>
               <data name="payload" lengthPrefix="{}"/>
               <frame name="Frame">
                 <sync name="Sync"><int name="SyncField" type="uint16" defaultValue="0xabcd"/></sync>
                 <size name="Size" field="ns.len"/>
                 <payload name="Data"/>
               </frame>
             </ns>
           </schema>"#,
        prefix
    )
}

#[test]
fn namespace_sibling_prefix() {
    let protocol = validated(&namespace_prefixed("$len"));
    assert_eq!(protocol.find_field("ns.len").map(|f| f.kind_name()), Some("int"));
    assert_eq!(protocol.find_field("ns.payload").map(|f| f.kind_name()), Some("data"));
    let frame = protocol.find_frame("ns.Frame").expect("frame");
    let kinds: Vec<&str> = frame.layers.iter().map(|l| l.kind_name()).collect();
    assert_eq!(kinds, ["sync", "size", "payload"]);

    let mut protocol = Protocol::new();
    assert!(protocol.parse(&namespace_prefixed("$nolen")));
    assert!(!protocol.validate());
    assert!(errors(&protocol).iter().any(|e| e.contains("unknown sibling \"nolen\"")));
}

#[test]
fn frame_with_two_payloads_is_rejected() {
    let mut protocol = Protocol::new();
    let ok = protocol.parse(
        r#"<schema name="Demo">
             <frame name="Frame">
               <payload name="P1"/>
               <payload name="P2"/>
             </frame>
           </schema>"#,
    );
    assert!(!ok);
    let expected = SchemaError::LayerComposition {
        frame: "Frame".to_string(),
        reason: "exactly one payload layer is required, found 2".to_string(),
    };
    assert!(errors(&protocol).iter().any(|e| e.contains(&expected.to_string())));
}

#[test]
fn reference_chain_reaches_fixed_point() {
    let protocol = validated(
        r#"<schema name="Demo">
             <ns name="X">
               <ref name="A" field="X.B"/>
               <ref name="B" field="X.C"/>
               <int name="C" type="uint32"/>
             </ns>
             <ns name="Y">
               <message name="M" id="1">
                 <ref field="X.A"/>
               </message>
             </ns>
           </schema>"#,
    );
    let schema = protocol.schema().expect("schema");
    let message = protocol.find_message("Y.M").expect("message");
    // the nameless ref takes the name of its target
    assert_eq!(message.fields[0].name(), "A");
    assert_eq!(message.min_length(&schema.fields), 4);

    let mut accessed = AccessedFields::new();
    message.fields.iter().for_each(|f| accessed.record_references(f));
    let mut emitted = Vec::new();
    let passes = accessed.run_to_fixed_point(&schema.fields, |_, f| emitted.push(f.external_ref().to_string()));
    assert!(passes <= 3);
    assert_eq!(emitted, ["X.A", "X.B", "X.C"]);
}

#[test]
fn documents_are_merged() {
    let mut protocol = Protocol::new();
    assert!(protocol.parse_named(
        "a.xml",
        r#"<schema name="Demo" version="3"><ns name="ns"><int name="Id" type="uint8"/></ns></schema>"#,
    ));
    assert!(protocol.parse_named(
        "b.xml",
        r#"<schema name="Demo"><ns name="ns"><message name="M" id="1"><ref field="ns.Id"/></message></ns></schema>"#,
    ));
    assert!(protocol.validate());
    assert_eq!(protocol.schema().map(|s| s.version), Some(3));
    assert!(protocol.find_message("ns.M").is_some());
    assert!(!protocol.parse(r#"<schema name="Demo"/>"#));
}

#[test]
fn schema_file_is_read_from_disk() {
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    file.write_all(FRAMED.as_bytes()).expect("write");
    let mut protocol = Protocol::new();
    assert!(protocol.parse_file(file.path()));
    assert!(protocol.validate());

    let mut missing = Protocol::new();
    assert!(!missing.parse_file(file.path().with_extension("missing")));
    assert_eq!(missing.diagnostics().error_count(), 1);
}

#[test]
fn duplicate_message_ids() {
    let text = |allowed: &str| {
        format!(
            r#"<schema name="Demo" nonUniqueMsgIdAllowed="{}">
                 <message name="A" id="5"/>
                 <message name="B" id="5"/>
               </schema>"#,
            allowed
        )
    };
    let mut protocol = Protocol::new();
    assert!(protocol.parse(&text("false")));
    assert!(!protocol.validate());
    assert!(errors(&protocol)[0].contains("already used by \"A\""));

    let protocol = validated(&text("true"));
    let names: Vec<&str> = protocol.all_messages().iter().map(|m| m.name.as_str()).collect();
    assert_eq!(names, ["A", "B"]);
}

#[test]
fn symbolic_ids_order_messages() {
    let protocol = validated(
        r#"<schema name="Demo">
             <ns name="ns">
               <enum name="MsgId" type="uint8" semanticType="messageId">
                 <validValue name="Low" val="1"/>
                 <validValue name="High" val="9"/>
               </enum>
               <message name="Second" id="MsgId.High"/>
               <message name="First" id="MsgId.Low"/>
             </ns>
           </schema>"#,
    );
    let ids: Vec<Option<i128>> = protocol.all_messages().iter().map(|m| m.id).collect();
    assert_eq!(ids, [Some(1), Some(9)]);
    assert_eq!(protocol.find_message_id_field().map(|f| f.name()), Some("MsgId"));
}

#[test]
fn undeclared_platform_is_an_error() {
    let text = r#"<schema name="Demo">
                    <platforms><platform name="arm"/></platforms>
                    <message name="A" id="1" platforms="arm"/>
                    <message name="B" id="2" platforms="x86"/>
                  </schema>"#;
    let mut protocol = Protocol::new();
    assert!(protocol.parse(text));
    assert!(!protocol.validate());
    let errors = errors(&protocol);
    assert!(errors.iter().any(|e| e.contains("platform \"x86\" has not been declared")));
    assert!(!errors.iter().any(|e| e.contains("\"arm\"")));
}

const VARIANT: &str = r#"
<schema name="Demo" version="3">
  <interface name="Iface">
    <int name="version" type="uint8" semanticType="version"/>
  </interface>
  <variant name="V">
    <int name="P1" type="uint8"/>
    <int name="P2" type="uint16" sinceVersion="2"/>
  </variant>
</schema>"#;

#[test]
fn version_dependent_variant_members() {
    let mut protocol = Protocol::new();
    assert!(protocol.parse(VARIANT));
    assert!(protocol.version_dependent_code());
    assert!(!protocol.validate());
    assert!(errors(&protocol).iter().any(|e| e.contains("version dependent member \"P2\"")));

    let mut protocol = Protocol::with_config(ProtocolConfig::default().version_dependent_code(false));
    assert!(protocol.parse(VARIANT));
    assert!(protocol.validate());
}

#[test]
fn warnings_can_fail_validation() {
    let text = r#"<schema name="Demo"><int name="i" type="uint8" bogus="1"/></schema>"#;
    let protocol = validated(text);
    assert_eq!(protocol.diagnostics().warning_count(), 1);

    let mut strict = Protocol::with_config(ProtocolConfig::default().warn_as_error(true));
    assert!(!strict.parse(text));
}

#[test]
fn callback_sees_location() {
    let seen: Rc<RefCell<Vec<String>>> = Rc::default();
    let sink = Rc::clone(&seen);
    let mut protocol = Protocol::new();
    protocol.set_error_report_callback(Box::new(move |_, msg| sink.borrow_mut().push(msg.to_string())));
    assert!(!protocol.parse_named("doc.xml", "<schema name=\"Demo\">\n<int name=\"i\"/>\n</schema>"));
    assert_eq!(seen.borrow().len(), 1);
    assert!(seen.borrow()[0].starts_with("doc.xml:2: "));
}
