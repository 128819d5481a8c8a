//! Class table construction.
//!
//! Builds the bootstrap class graph from a declaration list. The four
//! root classes reference each other before all of them are declared,
//! so references are held as plain names until they can be resolved:
//! two scan passes turn every resolvable name into an id, a linking
//! step converts the stragglers (or fails), and only then are sizes
//! derived and methods compiled.

use std::collections::{BTreeMap, HashMap};

use crate::compiler::{self, CompiledMethod};
use crate::error::CompileError;
use crate::image::source::{Declaration, read_declarations};
use crate::span::Span;

/// Index of a class in the table's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClassId(usize);

/// A parent or metaclass link: symbolic until the linking step.
#[derive(Debug, Clone, PartialEq, Eq)]
enum ClassRef {
    Name(String),
    Id(ClassId),
}

impl ClassRef {
    fn id(&self) -> ClassId {
        match self {
            ClassRef::Id(id) => *id,
            ClassRef::Name(name) => {
                unreachable!("unresolved class reference {name}")
            }
        }
    }
}

/// A resolved class record.
#[derive(Debug, Clone)]
pub struct Class {
    pub name: String,
    metaclass: ClassRef,
    parent: Option<ClassRef>,
    /// Instance variables this class introduces, excluding inherited.
    pub variables: Vec<String>,
    /// Total instance slots: own variables plus the parent's size.
    pub size: usize,
    pub methods: BTreeMap<String, CompiledMethod>,
    /// Back-references, in declaration order.
    pub subclasses: Vec<ClassId>,
    span: Span,
}

impl Class {
    pub fn metaclass(&self) -> ClassId {
        self.metaclass.id()
    }

    pub fn parent(&self) -> Option<ClassId> {
        self.parent.as_ref().map(ClassRef::id)
    }
}

/// The resolved class graph: every reference is an id, every size is
/// final, every method is compiled.
#[derive(Debug, Clone, Default)]
pub struct ClassTable {
    classes: Vec<Class>,
    names: HashMap<String, ClassId>,
}

impl ClassTable {
    /// Run the full build over a declaration list.
    pub fn build(
        declarations: &[Declaration],
    ) -> Result<ClassTable, CompileError> {
        let mut builder = Builder::new(declarations);
        builder.scan()?;
        // circular bootstrap references resolve on the second pass
        builder.scan()?;
        builder.link()?;
        builder.derive_sizes()?;
        builder.collect_subclasses();
        builder.compile_methods()?;
        let table = ClassTable {
            classes: builder.classes,
            names: builder.names,
        };
        log::info!(
            "built class table: {} classes, {} methods",
            table.len(),
            table
                .classes
                .iter()
                .map(|class| class.methods.len())
                .sum::<usize>(),
        );
        Ok(table)
    }

    pub fn id_of(&self, name: &str) -> Option<ClassId> {
        self.names.get(name).copied()
    }

    pub fn get(&self, id: ClassId) -> &Class {
        &self.classes[id.0]
    }

    pub fn class(&self, name: &str) -> Option<&Class> {
        self.id_of(name).map(|id| self.get(id))
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Classes in declaration order (synthesized metaclasses appear
    /// where their declaring class was scanned).
    pub fn iter(&self) -> impl Iterator<Item = (ClassId, &Class)> {
        self.classes
            .iter()
            .enumerate()
            .map(|(index, class)| (ClassId(index), class))
    }
}

/// Read image source and build its class table.
pub fn compile_image(source: &str) -> Result<ClassTable, CompileError> {
    let declarations = read_declarations(source)?;
    ClassTable::build(&declarations)
}

// ───────────────────────────────────────────────────────────────
//  Build passes
// ───────────────────────────────────────────────────────────────

struct Builder<'a> {
    declarations: &'a [Declaration],
    classes: Vec<Class>,
    names: HashMap<String, ClassId>,
}

impl<'a> Builder<'a> {
    fn new(declarations: &'a [Declaration]) -> Self {
        Self {
            declarations,
            classes: Vec::new(),
            names: HashMap::new(),
        }
    }

    /// Scan pass. Creates a record per class declaration on first
    /// sight; on later sights only refreshes links that are still
    /// symbolic, so extra passes are idempotent.
    fn scan(&mut self) -> Result<(), CompileError> {
        for declaration in self.declarations {
            match declaration {
                Declaration::RawClass {
                    name,
                    metaclass,
                    parent,
                    variables,
                    span,
                } => {
                    let metaclass = self.lookup(metaclass, *span)?;
                    let parent = match parent {
                        Some(parent) => Some(self.lookup(parent, *span)?),
                        None => None,
                    };
                    self.enter(name, metaclass, parent, variables, *span);
                }
                Declaration::Class {
                    name,
                    parent,
                    variables,
                    span,
                } => {
                    let parent_ref = match parent {
                        Some(parent) => Some(self.lookup(parent, *span)?),
                        None => None,
                    };
                    let metaclass =
                        self.synthesize_metaclass(name, parent, *span);
                    self.enter(name, metaclass, parent_ref, variables, *span);
                }
                Declaration::Method { .. } => {}
            }
        }
        Ok(())
    }

    /// Resolve a class name written in the source: an id once scanned,
    /// a placeholder while the declaration is still ahead, an error if
    /// no declaration will ever provide it.
    fn lookup(
        &self,
        name: &str,
        span: Span,
    ) -> Result<ClassRef, CompileError> {
        if let Some(&id) = self.names.get(name) {
            return Ok(ClassRef::Id(id));
        }
        if self.is_declared(name) {
            return Ok(ClassRef::Name(name.to_string()));
        }
        Err(CompileError::new(
            format!("Cannot find class {name}"),
            span,
        )
        .with_token(name.to_string()))
    }

    fn is_declared(&self, name: &str) -> bool {
        self.declarations.iter().any(|decl| match decl {
            Declaration::RawClass { name: n, .. }
            | Declaration::Class { name: n, .. } => n == name,
            Declaration::Method { .. } => false,
        })
    }

    /// Create `Meta<Name>` for an ordinary class declaration. Its
    /// metaclass is the fixed root metaclass `Class`; its parent is
    /// the parent's metaclass, or `Class` again for a hierarchy root.
    /// Links stay symbolic here; the linking step settles them.
    fn synthesize_metaclass(
        &mut self,
        name: &str,
        parent: &Option<String>,
        span: Span,
    ) -> ClassRef {
        let meta_name = format!("Meta{name}");
        if let Some(&id) = self.names.get(&meta_name) {
            self.refresh(id);
            return ClassRef::Id(id);
        }
        let meta_parent = match parent {
            Some(parent) => format!("Meta{parent}"),
            None => "Class".to_string(),
        };
        let metaclass = self.resolve_or_pend("Class");
        let parent = Some(self.resolve_or_pend(&meta_parent));
        ClassRef::Id(self.insert(&meta_name, metaclass, parent, &[], span))
    }

    fn resolve_or_pend(&self, name: &str) -> ClassRef {
        match self.names.get(name) {
            Some(&id) => ClassRef::Id(id),
            None => ClassRef::Name(name.to_string()),
        }
    }

    /// Insert a class on first sight, or refresh its pending links.
    fn enter(
        &mut self,
        name: &str,
        metaclass: ClassRef,
        parent: Option<ClassRef>,
        variables: &[String],
        span: Span,
    ) {
        match self.names.get(name) {
            Some(&id) => self.refresh(id),
            None => {
                self.insert(name, metaclass, parent, variables, span);
            }
        }
    }

    fn insert(
        &mut self,
        name: &str,
        metaclass: ClassRef,
        parent: Option<ClassRef>,
        variables: &[String],
        span: Span,
    ) -> ClassId {
        let id = ClassId(self.classes.len());
        self.classes.push(Class {
            name: name.to_string(),
            metaclass,
            parent,
            variables: variables.to_vec(),
            size: 0,
            methods: BTreeMap::new(),
            subclasses: Vec::new(),
            span,
        });
        self.names.insert(name.to_string(), id);
        log::trace!("entered class {name} as #{}", id.0);
        id
    }

    /// Re-resolve a record's still-symbolic links against the current
    /// table. Already-resolved links and variables stay untouched.
    fn refresh(&mut self, id: ClassId) {
        if let ClassRef::Name(name) = &self.classes[id.0].metaclass {
            if let Some(&target) = self.names.get(name) {
                self.classes[id.0].metaclass = ClassRef::Id(target);
            }
        }
        if let Some(ClassRef::Name(name)) = &self.classes[id.0].parent {
            if let Some(&target) = self.names.get(name) {
                self.classes[id.0].parent = Some(ClassRef::Id(target));
            }
        }
    }

    /// Convert every remaining symbolic link into an id.
    fn link(&mut self) -> Result<(), CompileError> {
        for index in 0..self.classes.len() {
            self.refresh(ClassId(index));
            let class = &self.classes[index];
            let pending = match (&class.metaclass, &class.parent) {
                (ClassRef::Name(name), _)
                | (_, Some(ClassRef::Name(name))) => Some(name.clone()),
                _ => None,
            };
            if let Some(name) = pending {
                return Err(CompileError::new(
                    format!("Cannot find class {name}"),
                    class.span,
                )
                .with_token(name));
            }
        }
        Ok(())
    }

    fn derive_sizes(&mut self) -> Result<(), CompileError> {
        let mut states = vec![SizeState::Pending; self.classes.len()];
        for index in 0..self.classes.len() {
            self.size_of(ClassId(index), &mut states)?;
        }
        Ok(())
    }

    fn size_of(
        &mut self,
        id: ClassId,
        states: &mut [SizeState],
    ) -> Result<usize, CompileError> {
        match states[id.0] {
            SizeState::Done => return Ok(self.classes[id.0].size),
            SizeState::InProgress => {
                let class = &self.classes[id.0];
                return Err(CompileError::new(
                    format!("Circular class hierarchy at {}", class.name),
                    class.span,
                )
                .with_token(class.name.clone()));
            }
            SizeState::Pending => {}
        }
        states[id.0] = SizeState::InProgress;
        let parent_size = match self.classes[id.0].parent() {
            Some(parent) => self.size_of(parent, states)?,
            None => 0,
        };
        let size = self.classes[id.0].variables.len() + parent_size;
        self.classes[id.0].size = size;
        states[id.0] = SizeState::Done;
        Ok(size)
    }

    fn collect_subclasses(&mut self) {
        for index in 0..self.classes.len() {
            if let Some(parent) = self.classes[index].parent() {
                self.classes[parent.0].subclasses.push(ClassId(index));
            }
        }
    }

    fn compile_methods(&mut self) -> Result<(), CompileError> {
        for declaration in self.declarations {
            let Declaration::Method {
                class_name,
                source,
                span,
            } = declaration
            else {
                continue;
            };
            let Some(&id) = self.names.get(class_name) else {
                return Err(CompileError::new(
                    format!("Unknown class {class_name}"),
                    *span,
                )
                .with_token(class_name.clone()));
            };
            let variables = self.instance_variable_chain(id);
            let method =
                compiler::compile_method_source(source, &variables)?;
            self.classes[id.0]
                .methods
                .insert(method.selector.clone(), method);
        }
        Ok(())
    }

    /// Instance variables visible to a class's methods, root first so
    /// inherited slots keep the indices the parent's methods use.
    fn instance_variable_chain(&self, id: ClassId) -> Vec<String> {
        let mut lineage = Vec::new();
        let mut cursor = Some(id);
        while let Some(id) = cursor {
            lineage.push(id);
            cursor = self.classes[id.0].parent();
        }
        lineage.reverse();
        lineage
            .into_iter()
            .flat_map(|id| self.classes[id.0].variables.iter().cloned())
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SizeState {
    Pending,
    InProgress,
    Done,
}

#[cfg(test)]
mod tests {
    use super::*;

    const BOOTSTRAP: &str = "\
RAWCLASS Object MetaObject nil
RAWCLASS Class      MetaClass Object      name parentClass methods size variables children
RAWCLASS MetaObject Class     Class
RAWCLASS MetaClass  Class     MetaObject
";

    fn build(source: &str) -> ClassTable {
        match compile_image(source) {
            Ok(table) => table,
            Err(e) => panic!("image build failed: {e}"),
        }
    }

    fn build_error(source: &str) -> CompileError {
        match compile_image(source) {
            Ok(_) => panic!("expected the image build to fail"),
            Err(e) => e,
        }
    }

    #[test]
    fn bootstrap_classes_resolve_their_circular_references() {
        let table = build(BOOTSTRAP);
        assert_eq!(table.len(), 4);
        let object = table.class("Object").unwrap();
        let class = table.class("Class").unwrap();
        assert_eq!(object.parent(), None);
        assert_eq!(object.metaclass(), table.id_of("MetaObject").unwrap());
        assert_eq!(object.size, 0);
        assert_eq!(class.parent(), table.id_of("Object"));
        assert_eq!(class.metaclass(), table.id_of("MetaClass").unwrap());
        assert_eq!(class.size, 6);
        let meta_object = table.class("MetaObject").unwrap();
        assert_eq!(meta_object.metaclass(), table.id_of("Class").unwrap());
        assert_eq!(meta_object.parent(), table.id_of("Class"));
    }

    #[test]
    fn class_declarations_synthesize_metaclasses() {
        let source = format!(
            "{BOOTSTRAP}CLASS Undefined Object
CLASS Boolean Object
CLASS True Boolean
CLASS False Boolean
"
        );
        let table = build(&source);
        let false_class = table.class("False").unwrap();
        let true_class = table.class("True").unwrap();
        assert_eq!(false_class.parent(), table.id_of("Boolean"));
        assert_eq!(false_class.parent(), true_class.parent());
        assert_eq!(
            false_class.metaclass(),
            table.id_of("MetaFalse").unwrap()
        );
        let meta_false = table.class("MetaFalse").unwrap();
        assert_eq!(meta_false.metaclass(), table.id_of("Class").unwrap());
        assert_eq!(meta_false.parent(), table.id_of("MetaBoolean"));
        assert!(meta_false.variables.is_empty());
    }

    #[test]
    fn rootless_class_declarations_fall_back_to_the_root_metaclass() {
        let source = "\
RAWCLASS Class Class nil
CLASS Thing nil
";
        let table = build(source);
        let meta_thing = table.class("MetaThing").unwrap();
        assert_eq!(meta_thing.parent(), table.id_of("Class"));
        assert_eq!(table.class("Thing").unwrap().parent(), None);
    }

    #[test]
    fn sizes_accumulate_through_the_parent_chain() {
        let source = format!(
            "{BOOTSTRAP}CLASS Context Object method arguments temporaries stack bytePointer stackTop previousContext
CLASS Block Context argumentLocation creatingContext oldBytePointer
"
        );
        let table = build(&source);
        assert_eq!(table.class("Context").unwrap().size, 7);
        assert_eq!(table.class("Block").unwrap().size, 10);
    }

    #[test]
    fn methods_compile_against_the_inherited_variable_chain() {
        let source = format!(
            "{BOOTSTRAP}CLASS Point Object x y
CLASS Point3 Point z
METHOD Point
x
\t^x
!
METHOD Point3
z
\t^z
!
"
        );
        let table = build(&source);
        let x = &table.class("Point").unwrap().methods["x"];
        assert_eq!(x.bytecode, vec![16, 242]);
        let z = &table.class("Point3").unwrap().methods["z"];
        assert_eq!(z.bytecode, vec![18, 242]);
    }

    #[test]
    fn primitive_methods_compile_to_their_exact_bytes() {
        let source = format!(
            "{BOOTSTRAP}METHOD MetaObject
in: object at: index put: value
\t\" change data field in object, used during initialization \"
\t<5 value object index>
!
METHOD Object
in: object at: index
\t<24 object index>.
\tself primitiveFailed
!
"
        );
        let table = build(&source);
        let put = &table.class("MetaObject").unwrap().methods["in:at:put:"];
        assert_eq!(put.bytecode, vec![35, 33, 34, 213, 245, 241]);
        let read = &table.class("Object").unwrap().methods["in:at:"];
        assert_eq!(
            read.bytecode,
            vec![33, 34, 13, 24, 245, 32, 129, 144, 0, 245, 241]
        );
    }

    #[test]
    fn subclass_lists_point_back_at_children() {
        let source = format!("{BOOTSTRAP}CLASS Undefined Object\n");
        let table = build(&source);
        let object = table.class("Object").unwrap();
        let undefined = table.id_of("Undefined").unwrap();
        assert!(object.subclasses.contains(&undefined));
        assert!(
            object.subclasses.contains(&table.id_of("Class").unwrap())
        );
    }

    #[test]
    fn methods_against_unknown_classes_fail() {
        let e = build_error(&format!(
            "{BOOTSTRAP}METHOD Frobnicate\nfoo ^nil\n!\n"
        ));
        assert_eq!(e.message, "Unknown class Frobnicate");
        assert_eq!(e.token.as_deref(), Some("Frobnicate"));
    }

    #[test]
    fn undeclared_parents_fail_at_scan() {
        let e = build_error("CLASS Orphan Missing\n");
        assert_eq!(e.message, "Cannot find class Missing");
        assert_eq!(e.token.as_deref(), Some("Missing"));
    }

    #[test]
    fn undeclared_metaclasses_fail() {
        let e = build_error("RAWCLASS Object MetaObject nil\n");
        assert_eq!(e.message, "Cannot find class MetaObject");
    }

    #[test]
    fn circular_parent_chains_are_rejected() {
        let e = build_error(
            "RAWCLASS Class Class nil\nCLASS A B\nCLASS B A\n",
        );
        assert!(
            e.message.starts_with("Circular class hierarchy"),
            "unexpected message: {}",
            e.message
        );
    }

    #[test]
    fn extra_scan_passes_change_nothing() {
        let declarations = read_declarations(BOOTSTRAP).unwrap();
        let mut builder = Builder::new(&declarations);
        builder.scan().unwrap();
        builder.scan().unwrap();
        let snapshot: Vec<_> = builder
            .classes
            .iter()
            .map(|class| {
                (
                    class.name.clone(),
                    class.metaclass.clone(),
                    class.parent.clone(),
                    class.variables.clone(),
                )
            })
            .collect();
        builder.scan().unwrap();
        let after: Vec<_> = builder
            .classes
            .iter()
            .map(|class| {
                (
                    class.name.clone(),
                    class.metaclass.clone(),
                    class.parent.clone(),
                    class.variables.clone(),
                )
            })
            .collect();
        assert_eq!(snapshot, after);
    }

    #[test]
    fn method_errors_carry_their_compile_message() {
        let e = build_error(&format!(
            "{BOOTSTRAP}METHOD Object\nbroken ^y\n!\n"
        ));
        assert_eq!(e.message, "Unknown variable \"y\"");
    }
}
