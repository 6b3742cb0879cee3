use std::sync::Arc;

use bytes::Bytes;
use emberlink_ber::{Class, EmberReader, EmberWriter, LengthForm, Tag};
use emberlink_schema::{ElementKind, Schema};
use tracing::{debug, trace};

use crate::contents::read_contents;
use crate::element::{Element, ElementId};
use crate::error::{Result, SyncError, TreeError};
use crate::glow::{app, command, contents, element};
use crate::invocation::InvocationResult;
use crate::request;
use crate::state::RequestState;
use crate::tree::{Change, Tree};
use crate::value::Value;

/// What an incoming message carried besides tree updates.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Applied {
    pub invocation_results: Vec<InvocationResult>,
}

/// Outcome of a synchronization pass.
#[derive(Debug, Clone, PartialEq)]
pub enum Progress {
    /// The whole tree is verified.
    Ready,
    /// More data is needed; send the requests, if any, and wait for the next message.
    Pending(Option<Bytes>),
    /// Everything has been received but the tree does not satisfy the schema.
    Failed(SyncError),
}

/// Mirrors a provider's tree and decides what to request next.
///
/// Call [`Synchronizer::poll`] once up front and after every
/// [`Synchronizer::apply`] to obtain the requests to send.
pub struct Synchronizer {
    tree: Tree,
    schema: Arc<dyn Schema>,
    form: LengthForm,
}

impl Synchronizer {
    pub fn new(schema: Arc<dyn Schema>, form: LengthForm) -> Self {
        Self {
            tree: Tree::new(),
            schema,
            form,
        }
    }

    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    pub fn tree_mut(&mut self) -> &mut Tree {
        &mut self.tree
    }

    pub fn form(&self) -> LengthForm {
        self.form
    }

    /// Apply one complete Glow message to the tree.
    ///
    /// Unknown root types and unknown collection items are skipped. An error
    /// aborts the rest of the message; whatever was applied before it stays.
    pub fn apply(&mut self, payload: &[u8]) -> Result<Applied> {
        let mut reader = EmberReader::new(payload);
        let mut applied = Applied::default();

        while reader.read()? {
            let outer = reader.outer_tag()?;
            let inner = reader.inner_tag()?;
            if !outer.is_application(app::ROOT) || !reader.is_container() {
                trace!(tag = %outer, "skipping unexpected top-level field");
                reader.skip()?;
            } else if inner.is_application(app::ROOT_ELEMENT_COLLECTION) {
                self.read_collection(&mut reader, Tree::ROOT, true)?;
            } else if inner.is_application(app::INVOCATION_RESULT) {
                applied
                    .invocation_results
                    .push(InvocationResult::read(&mut reader)?);
            } else {
                trace!(tag = %inner, "skipping root content");
                reader.skip()?;
            }
        }
        Ok(applied)
    }

    /// Recompute request states and work out what to do next.
    pub fn poll(&mut self) -> Result<Progress> {
        let mut failure = None;
        let state = self.recompute(Tree::ROOT, false, &mut failure);
        debug!(%state, elements = self.tree.len(), "synchronization pass");

        match state {
            RequestState::Verified => return Ok(Progress::Ready),
            RequestState::Complete => {
                self.recompute(Tree::ROOT, true, &mut failure);
                if let Some(error) = failure {
                    return Ok(Progress::Failed(error));
                }
            }
            RequestState::None | RequestState::RequestSent => {}
        }
        Ok(Progress::Pending(self.write_requests()?))
    }

    /// Encode an invocation of the function `id`.
    pub fn invocation_request(
        &self,
        id: ElementId,
        invocation_id: i32,
        arguments: &[Value],
    ) -> Result<Bytes> {
        match self.tree.get(id).map(Element::kind) {
            Some(ElementKind::Function) => request::encode_invocation(
                self.form,
                &self.tree.number_path(id),
                invocation_id,
                arguments,
            ),
            Some(_) => Err(TreeError::NotAFunction(self.tree.path_of(id))),
            None => Err(TreeError::UnknownElement(format!("{id:?}"))),
        }
    }

    /// Encode a value write to the parameter `id`.
    pub fn set_value_request(&self, id: ElementId, value: &Value) -> Result<Bytes> {
        match self.tree.get(id).map(Element::kind) {
            Some(ElementKind::Parameter) => {
                request::encode_set_value(self.form, &self.tree.number_path(id), value)
            }
            Some(_) => Err(TreeError::NotAParameter(self.tree.path_of(id))),
            None => Err(TreeError::UnknownElement(format!("{id:?}"))),
        }
    }

    // Reads the items of an element collection into `parent` and returns the
    // parent's resulting state. Qualified items are only valid at the root.
    fn read_collection(
        &mut self,
        reader: &mut EmberReader<'_>,
        parent: ElementId,
        qualified: bool,
    ) -> Result<RequestState> {
        let mut is_empty = true;

        while reader.read()? {
            let inner = reader.inner_tag()?;
            match record_kind(inner) {
                Some((kind, false)) if reader.is_container() => {
                    is_empty = false;
                    self.read_child(reader, parent, kind)?;
                }
                Some((kind, true)) if qualified && reader.is_container() => {
                    is_empty = false;
                    self.read_qualified(reader, kind)?;
                }
                _ => {
                    trace!(tag = %inner, "skipping collection item");
                    reader.skip()?;
                }
            }
        }

        let parent = self.tree.element_mut(parent);
        if is_empty {
            parent.set_state(RequestState::Complete);
        }
        Ok(parent.state())
    }

    fn read_child(
        &mut self,
        reader: &mut EmberReader<'_>,
        parent: ElementId,
        kind: ElementKind,
    ) -> Result<()> {
        if !reader.read()? {
            return Ok(());
        }
        if reader.outer_tag()?.context_number() != Some(element::NUMBER) {
            return reader.skip_to_end_of_container().map_err(Into::into);
        }
        let number = reader.read_u32()?;
        self.read_record(reader, parent, number, kind)?;
        Ok(())
    }

    fn read_qualified(&mut self, reader: &mut EmberReader<'_>, kind: ElementKind) -> Result<()> {
        if !reader.read()? {
            return Ok(());
        }
        if reader.outer_tag()?.context_number() != Some(element::PATH) {
            return reader.skip_to_end_of_container().map_err(Into::into);
        }
        let path = reader.read_relative_oid()?;
        let Some((&number, intermediate)) = path.split_last() else {
            return reader.skip_to_end_of_container().map_err(Into::into);
        };

        let mut chain = vec![Tree::ROOT];
        for &step in intermediate {
            let Some(parent) = chain.last().copied() else {
                break;
            };
            match self.tree.child_by_number(parent, step) {
                Some(child) => chain.push(child),
                None => {
                    trace!(?path, "dropping qualified record under unknown element");
                    return reader.skip_to_end_of_container().map_err(Into::into);
                }
            }
        }

        let Some((&parent, ancestors)) = chain.split_last() else {
            return Ok(());
        };
        let mut state = self.read_record(reader, parent, number, kind)?;
        for &ancestor in ancestors.iter().rev() {
            let element = self.tree.element_mut(ancestor);
            state = element.state().meet(state);
            element.set_state(state);
        }
        Ok(())
    }

    // Reads the fields following the number or path of a record. Updates the
    // child and the parent's state and returns the latter.
    fn read_record(
        &mut self,
        reader: &mut EmberReader<'_>,
        parent: ElementId,
        number: u32,
        kind: ElementKind,
    ) -> Result<RequestState> {
        let mut child = self.tree.child_by_number(parent, number);
        if let Some(id) = child {
            if self.tree.element(id).kind() != kind {
                return Err(TreeError::UnexpectedElement {
                    path: self.tree.path_of(id),
                });
            }
        }

        let mut child_state = RequestState::Complete;
        let mut is_empty = true;

        while reader.read()? {
            is_empty = false;
            match (reader.outer_tag()?.context_number(), child) {
                (Some(element::CONTENTS), Some(id)) if reader.is_container() => {
                    child_state = self.read_known_contents(reader, id)?;
                }
                (Some(element::CONTENTS), None) if reader.is_container() => {
                    child = self.read_new_contents(reader, parent, number, kind)?;
                    child_state = match child {
                        Some(id) => self.settled_state(id),
                        None => RequestState::Complete,
                    };
                }
                (Some(element::CHILDREN), Some(id))
                    if kind == ElementKind::Node && reader.is_container() =>
                {
                    child_state = self.read_collection(reader, id, false)?;
                }
                _ => reader.skip()?,
            }
        }

        if let Some(id) = child {
            let state = if is_empty {
                RequestState::Complete
            } else {
                child_state
            };
            self.tree.element_mut(id).set_state(state);
        }

        let parent = self.tree.element_mut(parent);
        let base = match parent.as_node() {
            Some(node) if node.has_children() => parent.state(),
            _ => RequestState::Complete,
        };
        let state = base.meet(child_state);
        parent.set_state(state);
        Ok(state)
    }

    fn read_known_contents(
        &mut self,
        reader: &mut EmberReader<'_>,
        id: ElementId,
    ) -> Result<RequestState> {
        let element = self.tree.element(id);
        let value = element.as_parameter().and_then(|p| p.value.clone());
        let description = element.description.clone();

        let online_changed = read_contents(self.tree.element_mut(id), reader)?;

        let element = self.tree.element(id);
        let value_changed = element.as_parameter().and_then(|p| p.value.as_ref()) != value.as_ref();
        let description_changed = element.description != description;
        if value_changed {
            self.tree.record(Change::Value(id));
        }
        if description_changed {
            self.tree.record(Change::Description(id));
        }
        if online_changed {
            debug!(path = %self.tree.path_of(id), online = self.tree.element(id).is_online(), "online state changed");
            self.tree.record(Change::Online(id));
        }
        Ok(self.settled_state(id))
    }

    fn read_new_contents(
        &mut self,
        reader: &mut EmberReader<'_>,
        parent: ElementId,
        number: u32,
        kind: ElementKind,
    ) -> Result<Option<ElementId>> {
        if !reader.read()? {
            return Ok(None);
        }
        let is_identifier = reader.outer_tag()?.context_number() == Some(contents::IDENTIFIER)
            && !reader.is_container();
        if !is_identifier {
            reader.skip_to_end_of_container()?;
            return Ok(None);
        }

        let identifier = reader.read_utf8()?;
        let parent_schema = self.tree.element(parent).schema;
        let Some(schema) = self.schema.construct(parent_schema, number, identifier, kind) else {
            trace!(identifier, number, %kind, "element not in schema, skipping");
            reader.skip_to_end_of_container()?;
            return Ok(None);
        };

        let element = Element::new(number, identifier.to_owned(), Some(parent), schema, kind);
        let id = self.tree.insert(parent, element)?;
        read_contents(self.tree.element_mut(id), reader)?;
        trace!(path = %self.tree.path_of(id), %kind, "element added");
        Ok(Some(id))
    }

    // State a record contributes after its contents were read: nodes keep
    // their own, leaves are complete.
    fn settled_state(&self, id: ElementId) -> RequestState {
        let element = self.tree.element(id);
        match element.kind() {
            ElementKind::Node => element.state(),
            ElementKind::Parameter | ElementKind::Function => RequestState::Complete,
        }
    }

    fn recompute(
        &mut self,
        id: ElementId,
        check: bool,
        failure: &mut Option<SyncError>,
    ) -> RequestState {
        let element = self.tree.element(id);
        if !element.is_online() {
            self.tree.element_mut(id).set_state(RequestState::Verified);
            return RequestState::Verified;
        }

        let state = element.state();
        let children: Vec<ElementId> = match element.as_node() {
            Some(node) => node.children().collect(),
            None => {
                if state == RequestState::Complete {
                    self.tree.element_mut(id).set_state(RequestState::Verified);
                    return RequestState::Verified;
                }
                return state;
            }
        };

        if children.is_empty() {
            if state == RequestState::Complete && self.required_children_present(id, check, failure)
            {
                self.tree.element_mut(id).set_state(RequestState::Verified);
                return RequestState::Verified;
            }
            return state;
        }
        if state == RequestState::Verified {
            return state;
        }

        let mut accumulated = RequestState::Verified;
        for child in children {
            let child_state = self.recompute(child, check, failure);
            accumulated = accumulated.meet(child_state);
            self.commit_visibility(id, child, child_state);
        }

        let state = if accumulated == RequestState::Verified
            && !self.required_children_present(id, check, failure)
        {
            RequestState::Complete
        } else {
            accumulated
        };
        self.tree.element_mut(id).set_state(state);
        state
    }

    // Children enter the live view once verified and leave it when they go offline.
    fn commit_visibility(&mut self, parent: ElementId, child: ElementId, child_state: RequestState) {
        let element = self.tree.element(child);
        if !element.online_changed || (element.is_online() && child_state != RequestState::Verified)
        {
            return;
        }
        let (number, online) = (element.number(), element.is_online());
        self.tree.element_mut(child).online_changed = false;

        let Some(node) = self.tree.element_mut(parent).node_mut() else {
            return;
        };
        let changed = if online {
            node.live.insert(number)
        } else {
            node.live.remove(&number)
        };
        if changed {
            self.tree.record(Change::Children(parent));
        }
    }

    fn required_children_present(
        &self,
        id: ElementId,
        check: bool,
        failure: &mut Option<SyncError>,
    ) -> bool {
        let element = self.tree.element(id);
        let Some(node) = element.as_node() else {
            return true;
        };
        let present: Vec<&str> = node
            .children()
            .map(|child| self.tree.element(child).identifier())
            .collect();

        match self.schema.required_children_present(element.schema(), &present) {
            Ok(()) => true,
            Err(missing) => {
                if check && failure.is_none() {
                    let parent = self.tree.path_of(id);
                    let path = if parent.is_empty() {
                        missing
                    } else {
                        format!("{parent}/{missing}")
                    };
                    *failure = Some(SyncError::MissingRequiredChild { path });
                }
                false
            }
        }
    }

    fn write_requests(&mut self) -> Result<Option<Bytes>> {
        if self.tree.state(Tree::ROOT) != RequestState::None {
            return Ok(None);
        }

        let mut writer = EmberWriter::with_form(self.form);
        request::start_root(&mut writer);
        let mut count = 0;
        self.write_request(&mut writer, Tree::ROOT, &mut count)?;
        writer.end_container()?;

        if count == 0 {
            return Ok(None);
        }
        debug!(count, "sending getDirectory requests");
        Ok(Some(writer.finish()?))
    }

    fn write_request(
        &mut self,
        writer: &mut EmberWriter,
        id: ElementId,
        count: &mut usize,
    ) -> Result<()> {
        let element = self.tree.element(id);
        if element.state() != RequestState::None {
            return Ok(());
        }
        let Some(node) = element.as_node() else {
            return Ok(());
        };

        let children: Vec<ElementId> = node.children().collect();
        if !children.is_empty() {
            for child in children {
                self.write_request(writer, child, count)?;
            }
            return Ok(());
        }

        if id == Tree::ROOT {
            request::write_command(writer, command::GET_DIRECTORY)?;
        } else {
            request::write_qualified_get_directory(writer, &self.tree.number_path(id))?;
        }
        trace!(path = %self.tree.path_of(id), "requesting children");
        self.tree.element_mut(id).set_state(RequestState::RequestSent);
        *count += 1;
        Ok(())
    }
}

impl std::fmt::Debug for Synchronizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Synchronizer")
            .field("elements", &self.tree.len())
            .field("root_state", &self.tree.state(Tree::ROOT))
            .field("form", &self.form)
            .finish()
    }
}

fn record_kind(tag: Tag) -> Option<(ElementKind, bool)> {
    if tag.class != Class::Application {
        return None;
    }
    Some(match tag.number {
        app::NODE => (ElementKind::Node, false),
        app::PARAMETER => (ElementKind::Parameter, false),
        app::FUNCTION => (ElementKind::Function, false),
        app::QUALIFIED_NODE => (ElementKind::Node, true),
        app::QUALIFIED_PARAMETER => (ElementKind::Parameter, true),
        app::QUALIFIED_FUNCTION => (ElementKind::Function, true),
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use emberlink_schema::{ChildSpec, DynamicSchema, NodeSpec, StaticSchema};

    use super::*;
    use crate::glow::{invocation_result, node, parameter, COLLECTION_ITEM};

    fn ctx(number: u32) -> Tag {
        Tag::context(number)
    }

    fn end(w: &mut EmberWriter) {
        w.end_container().unwrap();
    }

    fn message(build: impl FnOnce(&mut EmberWriter)) -> Bytes {
        let mut w = EmberWriter::with_form(LengthForm::Indefinite);
        request::start_root(&mut w);
        build(&mut w);
        end(&mut w);
        w.finish().unwrap()
    }

    fn start_node(w: &mut EmberWriter, number: u32, identifier: &str) {
        w.start_application(ctx(COLLECTION_ITEM), app::NODE);
        w.write_integer(ctx(element::NUMBER), i64::from(number));
        w.start_set(ctx(element::CONTENTS));
        w.write_utf8(ctx(contents::IDENTIFIER), identifier);
        end(w);
    }

    fn node(w: &mut EmberWriter, number: u32, identifier: &str) {
        start_node(w, number, identifier);
        end(w);
    }

    fn start_children(w: &mut EmberWriter) {
        w.start_application(ctx(element::CHILDREN), app::ELEMENT_COLLECTION);
    }

    fn parameter(w: &mut EmberWriter, number: u32, identifier: &str, value: i64) {
        w.start_application(ctx(COLLECTION_ITEM), app::PARAMETER);
        w.write_integer(ctx(element::NUMBER), i64::from(number));
        w.start_set(ctx(element::CONTENTS));
        w.write_utf8(ctx(contents::IDENTIFIER), identifier);
        w.write_integer(ctx(parameter::VALUE), value);
        end(w);
        end(w);
    }

    fn function(w: &mut EmberWriter, number: u32, identifier: &str) {
        w.start_application(ctx(COLLECTION_ITEM), app::FUNCTION);
        w.write_integer(ctx(element::NUMBER), i64::from(number));
        w.start_set(ctx(element::CONTENTS));
        w.write_utf8(ctx(contents::IDENTIFIER), identifier);
        end(w);
        end(w);
    }

    fn online(w: &mut EmberWriter, number: u32, online: bool) {
        w.start_application(ctx(COLLECTION_ITEM), app::NODE);
        w.write_integer(ctx(element::NUMBER), i64::from(number));
        w.start_set(ctx(element::CONTENTS));
        w.write_boolean(ctx(node::IS_ONLINE), online);
        end(w);
        end(w);
    }

    fn start_qualified_node(w: &mut EmberWriter, path: &[u32]) {
        w.start_application(ctx(COLLECTION_ITEM), app::QUALIFIED_NODE);
        w.write_relative_oid(ctx(element::PATH), path);
    }

    fn qualified_value(w: &mut EmberWriter, path: &[u32], value: i64) {
        w.start_application(ctx(COLLECTION_ITEM), app::QUALIFIED_PARAMETER);
        w.write_relative_oid(ctx(element::PATH), path);
        w.start_set(ctx(element::CONTENTS));
        w.write_integer(ctx(parameter::VALUE), value);
        end(w);
        end(w);
    }

    fn started(schema: Arc<dyn Schema>) -> Synchronizer {
        let mut sync = Synchronizer::new(schema, LengthForm::Definite);
        assert!(matches!(sync.poll().unwrap(), Progress::Pending(Some(_))));
        sync
    }

    // Root: Mixer (1) { Gain (1), Reset (2) }, Level (2)
    fn synced() -> Synchronizer {
        let mut sync = started(Arc::new(DynamicSchema));
        sync.apply(&message(|w| {
            node(w, 1, "Mixer");
            parameter(w, 2, "Level", 5);
        }))
        .unwrap();
        assert!(matches!(sync.poll().unwrap(), Progress::Pending(Some(_))));
        sync.apply(&message(|w| {
            start_qualified_node(w, &[1]);
            start_children(w);
            parameter(w, 1, "Gain", -6);
            function(w, 2, "Reset");
            end(w);
            end(w);
        }))
        .unwrap();
        assert_eq!(sync.poll().unwrap(), Progress::Ready);
        sync
    }

    fn identifiers(sync: &Synchronizer, ids: Vec<ElementId>) -> Vec<String> {
        ids.into_iter()
            .map(|id| sync.tree().get(id).unwrap().identifier().to_string())
            .collect()
    }

    fn value_of(sync: &Synchronizer, path: &str) -> Option<Value> {
        let id = sync.tree().find(path).unwrap();
        sync.tree().get(id).unwrap().as_parameter().unwrap().value.clone()
    }

    #[test]
    fn first_poll_requests_root_directory() {
        let mut sync = Synchronizer::new(Arc::new(DynamicSchema), LengthForm::Definite);
        let Progress::Pending(Some(request)) = sync.poll().unwrap() else {
            panic!("expected a request");
        };
        assert_eq!(
            request.as_ref(),
            &[
                0x60, 0x0B, 0x6B, 0x09, // Root, RootElementCollection
                0xA0, 0x07, 0x62, 0x05, // [0] Command
                0xA0, 0x03, 0x02, 0x01, 0x20, // [0] getDirectory
            ]
        );
        assert_eq!(sync.tree().state(Tree::ROOT), RequestState::RequestSent);
        assert_eq!(sync.poll().unwrap(), Progress::Pending(None));
    }

    #[test]
    fn unknown_nodes_are_requested_by_path() {
        let mut sync = started(Arc::new(DynamicSchema));
        sync.apply(&message(|w| {
            node(w, 1, "Mixer");
            parameter(w, 2, "Level", 5);
        }))
        .unwrap();

        let Progress::Pending(Some(request)) = sync.poll().unwrap() else {
            panic!("expected a request");
        };
        let mut reader = EmberReader::new(&request);
        assert!(reader.read().unwrap());
        assert!(reader.read().unwrap());
        assert!(reader.inner_tag().unwrap().is_application(app::QUALIFIED_NODE));
        assert!(reader.read().unwrap());
        assert_eq!(reader.read_relative_oid().unwrap(), vec![1]);

        let mixer = sync.tree().child_by_number(Tree::ROOT, 1).unwrap();
        assert_eq!(sync.tree().state(mixer), RequestState::RequestSent);
        let live = sync.tree().live_children(Tree::ROOT);
        assert_eq!(identifiers(&sync, live), ["Level"]);
    }

    #[test]
    fn full_tree_becomes_ready() {
        let sync = synced();
        let tree = sync.tree();
        assert_eq!(tree.state(Tree::ROOT), RequestState::Verified);
        assert_eq!(identifiers(&sync, tree.live_children(Tree::ROOT)), ["Mixer", "Level"]);

        let gain = tree.find("Mixer/Gain").unwrap();
        assert_eq!(tree.path_of(gain), "Mixer/Gain");
        assert_eq!(tree.number_path(gain), vec![1, 1]);
        assert_eq!(value_of(&sync, "Mixer/Gain"), Some(Value::Integer(-6)));
        assert_eq!(tree.get(tree.find("Mixer/Reset").unwrap()).unwrap().kind(), ElementKind::Function);
    }

    #[test]
    fn value_update_downgrades_ancestors_until_recomputed() {
        let mut sync = synced();
        sync.apply(&message(|w| qualified_value(w, &[1, 1], -3))).unwrap();

        let mixer = sync.tree().find("Mixer").unwrap();
        assert_eq!(sync.tree().state(mixer), RequestState::Complete);
        assert_eq!(sync.tree().state(Tree::ROOT), RequestState::Complete);
        assert_eq!(value_of(&sync, "Mixer/Gain"), Some(Value::Integer(-3)));

        assert_eq!(sync.poll().unwrap(), Progress::Ready);
        assert_eq!(sync.tree().state(mixer), RequestState::Verified);
    }

    #[test]
    fn unverified_child_holds_back_ancestors() {
        let mut sync = synced();
        sync.apply(&message(|w| {
            start_qualified_node(w, &[1]);
            start_children(w);
            node(w, 3, "Sub");
            end(w);
            end(w);
        }))
        .unwrap();

        assert!(matches!(sync.poll().unwrap(), Progress::Pending(Some(_))));
        let mixer = sync.tree().find("Mixer").unwrap();
        assert_ne!(sync.tree().state(mixer), RequestState::Verified);
        assert_ne!(sync.tree().state(Tree::ROOT), RequestState::Verified);
        assert_eq!(identifiers(&sync, sync.tree().live_children(mixer)), ["Gain", "Reset"]);

        sync.apply(&message(|w| {
            start_qualified_node(w, &[1, 3]);
            start_children(w);
            end(w);
            end(w);
        }))
        .unwrap();
        assert_eq!(sync.poll().unwrap(), Progress::Ready);
        assert_eq!(
            identifiers(&sync, sync.tree().live_children(mixer)),
            ["Gain", "Reset", "Sub"]
        );
    }

    #[test]
    fn offline_flap_reverifies_without_requests() {
        let mut sync = synced();
        let mixer = sync.tree().find("Mixer").unwrap();
        sync.tree_mut().drain_changes();

        sync.apply(&message(|w| online(w, 1, false))).unwrap();
        assert!(!sync.tree().get(mixer).unwrap().is_online());
        assert_eq!(sync.poll().unwrap(), Progress::Ready);
        assert_eq!(identifiers(&sync, sync.tree().live_children(Tree::ROOT)), ["Level"]);
        assert!(sync.tree().find("Mixer/Gain").is_none());
        assert_eq!(
            sync.tree_mut().drain_changes(),
            vec![Change::Online(mixer), Change::Children(Tree::ROOT)]
        );

        sync.apply(&message(|w| online(w, 1, true))).unwrap();
        assert_eq!(sync.poll().unwrap(), Progress::Ready);
        assert_eq!(
            identifiers(&sync, sync.tree().live_children(Tree::ROOT)),
            ["Mixer", "Level"]
        );
        assert!(sync.tree().find("Mixer/Gain").is_some());
    }

    #[test]
    fn missing_required_root_child_fails_readiness() {
        let schema = StaticSchema::new(
            &NodeSpec::new()
                .with_child(ChildSpec::parameter("Gain"))
                .with_child(ChildSpec::parameter("Level").optional()),
        )
        .unwrap();
        let mut sync = started(Arc::new(schema));
        sync.apply(&message(|w| parameter(w, 2, "Level", 1))).unwrap();

        assert_eq!(
            sync.poll().unwrap(),
            Progress::Failed(SyncError::MissingRequiredChild {
                path: "Gain".to_string()
            })
        );
    }

    #[test]
    fn missing_nested_child_is_named_by_path() {
        let schema = StaticSchema::new(
            &NodeSpec::new().with_child(ChildSpec::node("Channel").with_child(ChildSpec::parameter("Gain"))),
        )
        .unwrap();
        let mut sync = started(Arc::new(schema));
        sync.apply(&message(|w| node(w, 1, "Channel"))).unwrap();
        assert!(matches!(sync.poll().unwrap(), Progress::Pending(Some(_))));

        sync.apply(&message(|w| {
            start_qualified_node(w, &[1]);
            start_children(w);
            parameter(w, 2, "Mute", 0);
            end(w);
            end(w);
        }))
        .unwrap();
        assert_eq!(
            sync.poll().unwrap(),
            Progress::Failed(SyncError::MissingRequiredChild {
                path: "Channel/Gain".to_string()
            })
        );
    }

    #[test]
    fn latest_value_wins() {
        let mut sync = synced();
        let gain = sync.tree().find("Mixer/Gain").unwrap();
        sync.tree_mut().drain_changes();

        sync.apply(&message(|w| qualified_value(w, &[1, 1], 1))).unwrap();
        sync.apply(&message(|w| qualified_value(w, &[1, 1], 2))).unwrap();
        sync.apply(&message(|w| {
            qualified_value(w, &[1, 1], 3);
            qualified_value(w, &[1, 1], 4);
        }))
        .unwrap();

        assert_eq!(sync.poll().unwrap(), Progress::Ready);
        assert_eq!(value_of(&sync, "Mixer/Gain"), Some(Value::Integer(4)));
        assert_eq!(sync.tree_mut().drain_changes(), vec![Change::Value(gain)]);
    }

    #[test]
    fn unknown_tags_are_skipped() {
        let mut sync = started(Arc::new(DynamicSchema));
        let mut payload = message(|w| {
            w.start_application(ctx(COLLECTION_ITEM), app::MATRIX);
            w.write_integer(ctx(0), 7);
            w.start_set(ctx(1));
            w.write_utf8(ctx(0), "Router");
            end(w);
            end(w);
            w.start_application(ctx(COLLECTION_ITEM), app::TEMPLATE);
            w.write_integer(ctx(0), 8);
            end(w);
            w.write_integer(ctx(COLLECTION_ITEM), 99);
            parameter(w, 1, "Level", 3);
        })
        .to_vec();

        let mut streams = EmberWriter::new();
        streams.start_application(Tag::application(app::ROOT), app::STREAM_COLLECTION);
        streams.start_application(ctx(COLLECTION_ITEM), app::STREAM_ENTRY);
        streams.write_integer(ctx(0), 1);
        streams.write_integer(ctx(1), 2);
        end(&mut streams);
        end(&mut streams);
        payload.extend_from_slice(&streams.finish().unwrap());

        let applied = sync.apply(&payload).unwrap();
        assert!(applied.invocation_results.is_empty());
        assert_eq!(sync.tree().len(), 2);
        assert_eq!(sync.poll().unwrap(), Progress::Ready);
        assert_eq!(value_of(&sync, "Level"), Some(Value::Integer(3)));
    }

    #[test]
    fn unrecognized_children_are_not_materialized() {
        let schema = StaticSchema::new(
            &NodeSpec::new().with_child(ChildSpec::node("Mixer").with_child(ChildSpec::parameter("Gain"))),
        )
        .unwrap();
        let mut sync = started(Arc::new(schema));
        sync.apply(&message(|w| {
            start_node(w, 1, "Mixer");
            start_children(w);
            parameter(w, 1, "Gain", 0);
            start_node(w, 2, "Aux");
            start_children(w);
            parameter(w, 1, "Deep", 1);
            end(w);
            end(w);
            end(w);
            end(w);
            node(w, 3, "Other");
        }))
        .unwrap();

        assert_eq!(sync.tree().len(), 3);
        assert_eq!(sync.poll().unwrap(), Progress::Ready);
        assert!(sync.tree().find("Mixer/Gain").is_some());
        assert!(sync.tree().find("Mixer/Aux").is_none());
    }

    #[test]
    fn qualified_record_under_unknown_branch_is_dropped() {
        let mut sync = started(Arc::new(DynamicSchema));
        sync.apply(&message(|w| {
            qualified_value(w, &[9, 1], 5);
            parameter(w, 1, "Level", 3);
        }))
        .unwrap();

        assert_eq!(sync.tree().len(), 2);
        assert!(sync.tree().find_by_numbers(&[9]).is_none());
    }

    #[test]
    fn empty_record_completes_a_requested_node() {
        let mut sync = started(Arc::new(DynamicSchema));
        sync.apply(&message(|w| {
            node(w, 1, "Mixer");
            parameter(w, 2, "Level", 5);
        }))
        .unwrap();
        assert!(matches!(sync.poll().unwrap(), Progress::Pending(Some(_))));
        let mixer = sync.tree().find_by_numbers(&[1]).unwrap();
        assert_eq!(sync.tree().state(mixer), RequestState::RequestSent);

        sync.apply(&message(|w| {
            start_qualified_node(w, &[1]);
            end(w);
        }))
        .unwrap();
        assert_eq!(sync.tree().state(mixer), RequestState::Complete);

        assert_eq!(sync.poll().unwrap(), Progress::Ready);
        assert_eq!(sync.tree().state(mixer), RequestState::Verified);
        assert!(sync.tree().children(mixer).is_empty());
    }

    #[test]
    fn kind_change_is_rejected() {
        let mut sync = synced();
        let result = sync.apply(&message(|w| node(w, 2, "Level")));
        assert_eq!(
            result,
            Err(TreeError::UnexpectedElement {
                path: "Level".to_string()
            })
        );
    }

    #[test]
    fn invocation_results_are_returned() {
        let mut sync = synced();
        let mut w = EmberWriter::new();
        w.start_application(Tag::application(app::ROOT), app::INVOCATION_RESULT);
        w.write_integer(ctx(invocation_result::INVOCATION_ID), 4);
        w.start_sequence(ctx(invocation_result::RESULT));
        w.write_integer(ctx(COLLECTION_ITEM), 10);
        end(&mut w);
        end(&mut w);

        let applied = sync.apply(&w.finish().unwrap()).unwrap();
        assert_eq!(
            applied.invocation_results,
            vec![InvocationResult {
                invocation_id: 4,
                success: true,
                result: vec![Value::Integer(10)],
            }]
        );
    }

    #[test]
    fn requests_check_element_kind() {
        let sync = synced();
        let reset = sync.tree().find("Mixer/Reset").unwrap();
        let level = sync.tree().find("Level").unwrap();

        assert!(sync.invocation_request(reset, 1, &[Value::Integer(2)]).is_ok());
        assert!(sync.set_value_request(level, &Value::Integer(2)).is_ok());
        assert_eq!(
            sync.invocation_request(level, 1, &[]),
            Err(TreeError::NotAFunction("Level".to_string()))
        );
        assert_eq!(
            sync.set_value_request(reset, &Value::Null),
            Err(TreeError::NotAParameter("Mixer/Reset".to_string()))
        );
    }
}
