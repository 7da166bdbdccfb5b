//! The parse walk.
//!
//! A recursive descent over the tree that, at each node, routes either to a
//! matching literal child or to the unique dynamic child, applying defaults,
//! flags and intermediate executors along the way. Suspension happens only
//! at parser and preprocessor boundaries; dropping the future cancels the
//! walk before the next parser runs.

use std::sync::Arc;

use futures::future::BoxFuture;

use crate::command::Command;
use crate::component::{ComponentKind, DefaultValue};
use crate::context::CommandContext;
use crate::dispatcher::CommandDispatcher;
use crate::error::DispatchError;
use crate::input::CommandInput;
use crate::parser::ParserFailure;
use crate::sender::CommandSender;
use crate::tree::{CommandNode, first_owned_descendant};

/// What a dynamic-child attempt produced.
enum DynamicOutcome<S> {
    /// The walk resolved a command.
    Resolved(Arc<Command<S>>),
    /// No definitive answer; literal siblings may still match. Carries the
    /// parser failure, which surfaces if nothing else rescues the walk.
    Fallthrough(Option<ParserFailure>),
}

impl<S: CommandSender> CommandDispatcher<S> {
    pub(crate) fn parse_walk<'a>(
        &'a self,
        node: &'a Arc<CommandNode<S>>,
        context: &'a mut CommandContext<S>,
        input: &'a mut CommandInput,
    ) -> BoxFuture<'a, Result<Arc<Command<S>>, DispatchError>> {
        Box::pin(async move {
            if !node.is_root()
                && let Err(reason) = self.gate(node, context.sender())
            {
                return Err(DispatchError::NoPermission {
                    chain: node.chain_names(),
                    reason,
                });
            }

            let children = node.children();
            let next_token = input.peek_string().to_owned();
            let literal_matched = children
                .iter()
                .any(|child| child.accepts_literal(&next_token));

            // The unambiguous dynamic child is attempted first, but only when
            // the next token is not claimed by a literal sibling.
            let mut pending_failure = None;
            if !literal_matched {
                let mut dynamic = children.iter().filter(|child| {
                    child
                        .kind()
                        .is_some_and(|kind| kind != ComponentKind::Literal)
                });
                if let (Some(child), None) = (dynamic.next(), dynamic.next()) {
                    match self.attempt_dynamic(node, child, context, input).await? {
                        DynamicOutcome::Resolved(command) => return Ok(command),
                        DynamicOutcome::Fallthrough(failure) => pending_failure = failure,
                    }
                }
            }

            for child in &children {
                if child.kind() != Some(ComponentKind::Literal) {
                    continue;
                }
                let Some(component) = child.component() else {
                    continue;
                };
                let snapshot = input.cursor();
                match component.parse(context, input).await {
                    Ok(_) => {
                        context.record_parse(
                            component.name(),
                            snapshot,
                            input.cursor(),
                            true,
                            component.name(),
                        );
                        return self.parse_walk(child, context, input).await;
                    }
                    // A non-matching literal is recovered silently.
                    Err(_) => input.set_cursor(snapshot),
                }
            }

            if input.is_empty_ignoring_whitespace()
                && let Some(command) = node.owner()
            {
                self.check_command_permission(node, &command, context.sender())?;
                return Ok(command);
            }

            if node.is_root() {
                return Err(DispatchError::NoSuchCommand { input: next_token });
            }

            if let Some(failure) = pending_failure {
                log::debug!(
                    "argument parse failed at \"{}\": {failure}",
                    node.chain_names().join(" ")
                );
                return Err(DispatchError::ArgumentParse {
                    chain: node.chain_names(),
                    failure,
                });
            }

            Err(self.invalid_syntax(node, context))
        })
    }

    /// Attempts the unique dynamic child of `node`.
    async fn attempt_dynamic(
        &self,
        node: &Arc<CommandNode<S>>,
        child: &Arc<CommandNode<S>>,
        context: &mut CommandContext<S>,
        input: &mut CommandInput,
    ) -> Result<DynamicOutcome<S>, DispatchError> {
        let Some(component) = child.component() else {
            return Ok(DynamicOutcome::Fallthrough(None));
        };

        // Flags parse fine on empty input (consuming nothing), so the
        // empty-input handling below only applies to variable components.
        if input.is_empty_ignoring_whitespace() && component.kind() != ComponentKind::Flag {
            return match component.default_value() {
                Some(DefaultValue::Parsed(text)) => {
                    // Feed the default back through regular parsing, as if
                    // the sender had typed it.
                    let text = text.clone();
                    input.append_string(&text);
                    self.parse_walk(node, context, input)
                        .await
                        .map(DynamicOutcome::Resolved)
                }
                Some(DefaultValue::Computed(compute)) => {
                    let value = compute(context);
                    context.store_erased(component.name().to_owned(), value);
                    if child.is_leaf() {
                        let Some(command) = child.owner() else {
                            return Err(self.invalid_syntax(child, context));
                        };
                        self.check_command_permission(child, &command, context.sender())?;
                        Ok(DynamicOutcome::Resolved(command))
                    } else {
                        self.parse_walk(child, context, input)
                            .await
                            .map(DynamicOutcome::Resolved)
                    }
                }
                None if !component.is_required() => {
                    let command = child.owner().or_else(|| first_owned_descendant(child));
                    match command {
                        Some(command) => {
                            self.check_command_permission(child, &command, context.sender())?;
                            Ok(DynamicOutcome::Resolved(command))
                        }
                        None => Err(self.invalid_syntax(child, context)),
                    }
                }
                None => {
                    // Required child without input: the node itself may be an
                    // intermediate executor.
                    if let Some(command) = node.owner() {
                        self.check_command_permission(node, &command, context.sender())?;
                        Ok(DynamicOutcome::Resolved(command))
                    } else {
                        Err(self.invalid_syntax(node, context))
                    }
                }
            };
        }

        // A preprocessor failure is the only failure class that propagates
        // from here; a parser failure falls through so literal siblings can
        // still be tried.
        if let Err(failure) = component.preprocess(context, input).await {
            return Err(DispatchError::ArgumentParse {
                chain: node.chain_names(),
                failure,
            });
        }

        let snapshot = input.cursor();
        match component.parse(context, input).await {
            Ok(value) => {
                let captured = input.input()[snapshot..input.cursor()].trim().to_owned();
                context.record_parse(component.name(), snapshot, input.cursor(), true, captured);
                if component.kind() == ComponentKind::Variable {
                    context.store_erased(component.name().to_owned(), value);
                }
                if child.is_leaf() {
                    if input.is_empty_ignoring_whitespace() {
                        let Some(command) = child.owner() else {
                            return Err(self.invalid_syntax(child, context));
                        };
                        self.check_command_permission(child, &command, context.sender())?;
                        Ok(DynamicOutcome::Resolved(command))
                    } else {
                        Err(self.invalid_syntax(child, context))
                    }
                } else {
                    self.parse_walk(child, context, input)
                        .await
                        .map(DynamicOutcome::Resolved)
                }
            }
            Err(failure) => {
                input.set_cursor(snapshot);
                context.record_parse(
                    component.name(),
                    snapshot,
                    snapshot,
                    false,
                    failure.attempted().to_owned(),
                );
                log::debug!("parser for \"{}\" declined: {failure}", component.name());
                Ok(DynamicOutcome::Fallthrough(Some(failure)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    use crate::command::{Command, CommandHandler, handler_fn};
    use crate::dispatcher::CommandDispatcher;
    use crate::error::{DeniedReason, DispatchError};
    use crate::parser::flag::CommandFlag;
    use crate::parser::standard::{BooleanParser, DurationParser, IntegerParser, StringParser};
    use crate::permission::{Permission, PermissionChecker};
    use crate::sender::{CommandSender, SenderKind};
    use crate::settings::Settings;

    const PLAYER: SenderKind = SenderKind::named("player");
    const CONSOLE: SenderKind = SenderKind::named("console");

    #[derive(Clone, Debug)]
    struct Sender {
        kind: SenderKind,
        permissions: Vec<&'static str>,
    }

    impl Sender {
        fn player() -> Self {
            Self {
                kind: PLAYER,
                permissions: Vec::new(),
            }
        }

        fn console() -> Self {
            Self {
                kind: CONSOLE,
                permissions: Vec::new(),
            }
        }

        fn with_permissions(permissions: &[&'static str]) -> Self {
            Self {
                kind: PLAYER,
                permissions: permissions.to_vec(),
            }
        }
    }

    impl CommandSender for Sender {
        fn kind(&self) -> SenderKind {
            self.kind
        }
    }

    struct SenderPermissions;

    impl PermissionChecker<Sender> for SenderPermissions {
        fn has_permission(&self, sender: &Sender, permission: &str) -> bool {
            sender.permissions.contains(&permission)
        }
    }

    fn dispatcher() -> CommandDispatcher<Sender> {
        CommandDispatcher::builder()
            .permission_checker(SenderPermissions)
            .build()
    }

    fn ok_handler() -> impl CommandHandler<Sender> {
        handler_fn(|_context| Ok(()))
    }

    #[tokio::test]
    async fn test_greedy_string_consumes_rest() {
        let dispatcher = dispatcher();
        dispatcher
            .register(
                Command::builder("greedy")
                    .required("message", StringParser::greedy())
                    .handler(ok_handler())
                    .build()
                    .expect("command"),
            )
            .expect("register");

        let outcome = dispatcher
            .parse(Sender::player(), "greedy hello world")
            .await
            .expect("parse");
        assert_eq!(
            outcome.context.get::<String>("message").map(String::as_str),
            Some("hello world")
        );
    }

    #[tokio::test]
    async fn test_quoted_string_pair() {
        let dispatcher = dispatcher();
        dispatcher
            .register(
                Command::builder("quoted")
                    .required("message1", StringParser::quoted())
                    .required("message2", StringParser::single())
                    .handler(ok_handler())
                    .build()
                    .expect("command"),
            )
            .expect("register");

        let outcome = dispatcher
            .parse(Sender::player(), "quoted 'quoted \" string' unquoted")
            .await
            .expect("parse");
        assert_eq!(
            outcome
                .context
                .get::<String>("message1")
                .map(String::as_str),
            Some("quoted \" string")
        );
        assert_eq!(
            outcome
                .context
                .get::<String>("message2")
                .map(String::as_str),
            Some("unquoted")
        );

        let error = dispatcher
            .parse(Sender::player(), "quoted 'quoted quoted unquoted")
            .await
            .expect_err("unterminated quote");
        assert!(matches!(error, DispatchError::ArgumentParse { .. }));
    }

    #[tokio::test]
    async fn test_duration_argument() {
        let dispatcher = dispatcher();
        dispatcher
            .register(
                Command::builder("duration")
                    .required("d", DurationParser)
                    .handler(ok_handler())
                    .build()
                    .expect("command"),
            )
            .expect("register");

        let outcome = dispatcher
            .parse(Sender::player(), "duration 2d12h7m34s")
            .await
            .expect("parse");
        let expected = Duration::from_secs(2 * 86_400 + 12 * 3_600 + 7 * 60 + 34);
        assert_eq!(outcome.context.get::<Duration>("d"), Some(&expected));

        let error = dispatcher
            .parse(Sender::player(), "duration d")
            .await
            .expect_err("bare unit");
        assert!(matches!(error, DispatchError::ArgumentParse { .. }));
    }

    #[tokio::test]
    async fn test_permission_split_between_siblings() {
        let dispatcher = dispatcher();
        dispatcher
            .register(
                Command::builder("test")
                    .literal("foo")
                    .permission(Permission::atom("p1"))
                    .handler(ok_handler())
                    .build()
                    .expect("command"),
            )
            .expect("register foo");
        dispatcher
            .register(
                Command::builder("test")
                    .literal("bar")
                    .permission(Permission::atom("p2"))
                    .handler(ok_handler())
                    .build()
                    .expect("command"),
            )
            .expect("register bar");

        let sender = Sender::with_permissions(&["p2"]);
        let error = dispatcher
            .parse(sender.clone(), "test foo")
            .await
            .expect_err("p1 required");
        assert!(matches!(
            error,
            DispatchError::NoPermission { chain, reason: DeniedReason::Permission }
                if chain == vec!["test", "foo"]
        ));

        dispatcher
            .parse(sender, "test bar")
            .await
            .expect("p2 suffices");
    }

    #[tokio::test]
    async fn test_intermediate_executor_permissions() {
        let dispatcher = dispatcher();
        dispatcher
            .register(
                Command::builder("first")
                    .permission(Permission::atom("first"))
                    .handler(ok_handler())
                    .build()
                    .expect("command"),
            )
            .expect("register short");
        dispatcher
            .register(
                Command::builder("first")
                    .required("n", IntegerParser::new())
                    .permission(Permission::atom("second"))
                    .handler(ok_handler())
                    .build()
                    .expect("command"),
            )
            .expect("register long");

        let sender = Sender::with_permissions(&["first"]);
        let outcome = dispatcher
            .parse(sender.clone(), "first")
            .await
            .expect("intermediate executor runs");
        assert_eq!(outcome.command.components().len(), 1);

        let error = dispatcher
            .parse(sender, "first 10")
            .await
            .expect_err("second required");
        assert!(matches!(error, DispatchError::NoPermission { .. }));

        let outcome = dispatcher
            .parse(Sender::with_permissions(&["second"]), "first 10")
            .await
            .expect("long form runs");
        assert_eq!(outcome.context.get::<i64>("n"), Some(&10));
    }

    #[tokio::test]
    async fn test_predicate_permission_sees_live_state() {
        let allowed = Arc::new(AtomicBool::new(true));
        let captured = Arc::clone(&allowed);

        let dispatcher = dispatcher();
        dispatcher
            .register(
                Command::builder("predicate")
                    .permission(Permission::predicate(move |_sender: &Sender| {
                        captured.load(Ordering::Relaxed)
                    }))
                    .handler(ok_handler())
                    .build()
                    .expect("command"),
            )
            .expect("register");

        dispatcher
            .execute(Sender::player(), "predicate")
            .await
            .expect("allowed while the flag holds");

        allowed.store(false, Ordering::Relaxed);
        let error = dispatcher
            .execute(Sender::player(), "predicate")
            .await
            .expect_err("denied after the flip");
        assert!(matches!(error, DispatchError::NoPermission { .. }));
    }

    #[tokio::test]
    async fn test_parsed_default_feeds_back_through_parsing() {
        let dispatcher = dispatcher();
        dispatcher
            .register(
                Command::builder("def")
                    .optional_with_default("x", IntegerParser::new(), "10")
                    .handler(ok_handler())
                    .build()
                    .expect("command"),
            )
            .expect("register");

        let outcome = dispatcher
            .parse(Sender::player(), "def")
            .await
            .expect("default applies");
        assert_eq!(outcome.context.get::<i64>("x"), Some(&10));

        let outcome = dispatcher
            .parse(Sender::player(), "def 3")
            .await
            .expect("explicit value wins");
        assert_eq!(outcome.context.get::<i64>("x"), Some(&3));
    }

    #[tokio::test]
    async fn test_computed_default_bypasses_parser() {
        use crate::component::CommandComponent;
        let dispatcher = dispatcher();
        dispatcher
            .register(
                Command::builder("comp")
                    .component(
                        CommandComponent::optional("x", IntegerParser::new())
                            .with_default_computed(|_context| 42_i64),
                    )
                    .handler(ok_handler())
                    .build()
                    .expect("command"),
            )
            .expect("register");

        let outcome = dispatcher
            .parse(Sender::player(), "comp")
            .await
            .expect("computed default applies");
        assert_eq!(outcome.context.get::<i64>("x"), Some(&42));
    }

    #[tokio::test]
    async fn test_optional_without_default() {
        let dispatcher = dispatcher();
        dispatcher
            .register(
                Command::builder("opt")
                    .optional("x", IntegerParser::new())
                    .handler(ok_handler())
                    .build()
                    .expect("command"),
            )
            .expect("register");

        let outcome = dispatcher
            .parse(Sender::player(), "opt")
            .await
            .expect("optional may be omitted");
        assert_eq!(outcome.context.get::<i64>("x"), None);

        let outcome = dispatcher
            .parse(Sender::player(), "opt 5 ")
            .await
            .expect("trailing whitespace is fine");
        assert_eq!(outcome.context.get::<i64>("x"), Some(&5));
    }

    #[tokio::test]
    async fn test_syntax_failures() {
        let dispatcher = dispatcher();
        dispatcher
            .register(
                Command::builder("syn")
                    .required("x", IntegerParser::new())
                    .handler(ok_handler())
                    .build()
                    .expect("command"),
            )
            .expect("register");

        let error = dispatcher
            .parse(Sender::player(), "syn")
            .await
            .expect_err("missing required argument");
        assert!(matches!(error, DispatchError::InvalidSyntax { .. }));

        let error = dispatcher
            .parse(Sender::player(), "syn 5 extra")
            .await
            .expect_err("unconsumed input");
        assert!(matches!(error, DispatchError::InvalidSyntax { .. }));

        let error = dispatcher
            .parse(Sender::player(), "syn abc")
            .await
            .expect_err("committed parse failure");
        assert!(matches!(
            error,
            DispatchError::ArgumentParse { chain, .. } if chain == vec!["syn"]
        ));
    }

    #[tokio::test]
    async fn test_unknown_command() {
        let dispatcher = dispatcher();
        dispatcher
            .register(
                Command::builder("known")
                    .handler(ok_handler())
                    .build()
                    .expect("command"),
            )
            .expect("register");

        let error = dispatcher
            .parse(Sender::player(), "nope")
            .await
            .expect_err("unknown command");
        assert!(matches!(
            error,
            DispatchError::NoSuchCommand { input } if input == "nope"
        ));

        let error = dispatcher
            .parse(Sender::player(), "")
            .await
            .expect_err("empty input");
        assert!(matches!(
            error,
            DispatchError::NoSuchCommand { input } if input.is_empty()
        ));
    }

    #[tokio::test]
    async fn test_sender_kind_gating_and_wrapper_check() {
        let dispatcher = dispatcher();
        dispatcher
            .register(
                Command::builder("shutdown")
                    .sender_kind(CONSOLE)
                    .handler(ok_handler())
                    .build()
                    .expect("command"),
            )
            .expect("register");

        // The propagated kind union denies the player at the gate.
        let error = dispatcher
            .parse(Sender::player(), "shutdown")
            .await
            .expect_err("players cannot shut down");
        assert!(matches!(
            error,
            DispatchError::NoPermission {
                reason: DeniedReason::SenderKind,
                ..
            }
        ));

        dispatcher
            .parse(Sender::console(), "shutdown")
            .await
            .expect("console may");

        // With a mixed subtree the gate passes and the wrapper rejects the
        // resolved command instead.
        dispatcher
            .register(
                Command::builder("joint")
                    .sender_kind(CONSOLE)
                    .handler(ok_handler())
                    .build()
                    .expect("command"),
            )
            .expect("register joint");
        dispatcher
            .register(
                Command::builder("joint")
                    .required("n", IntegerParser::new())
                    .handler(ok_handler())
                    .build()
                    .expect("command"),
            )
            .expect("register joint long");

        let error = dispatcher
            .parse(Sender::player(), "joint")
            .await
            .expect_err("resolved command requires console");
        assert!(matches!(
            error,
            DispatchError::InvalidSenderKind { required, actual, .. }
                if required == CONSOLE && actual == PLAYER
        ));
    }

    #[tokio::test]
    async fn test_alias_resolves_to_same_command() {
        let dispatcher = dispatcher();
        dispatcher
            .register(
                Command::builder("teleport")
                    .alias("tp")
                    .handler(ok_handler())
                    .build()
                    .expect("command"),
            )
            .expect("register");

        let outcome = dispatcher
            .parse(Sender::player(), "tp")
            .await
            .expect("alias works");
        assert_eq!(outcome.command.root_name(), "teleport");
    }

    #[tokio::test]
    async fn test_flags_at_the_tail() {
        let dispatcher = dispatcher();
        dispatcher
            .register(
                Command::builder("flagged")
                    .required("x", IntegerParser::new())
                    .flag(CommandFlag::builder("verbose").short('v').build())
                    .flag(
                        CommandFlag::builder("count")
                            .short('c')
                            .value_parser(IntegerParser::new())
                            .build(),
                    )
                    .handler(ok_handler())
                    .build()
                    .expect("command"),
            )
            .expect("register");

        let outcome = dispatcher
            .parse(Sender::player(), "flagged 5 --count 3 -v")
            .await
            .expect("flags parse in any order");
        assert_eq!(outcome.context.get::<i64>("x"), Some(&5));
        assert_eq!(outcome.context.flag::<i64>("count"), Some(&3));
        assert_eq!(outcome.context.flag::<bool>("verbose"), Some(&true));

        let outcome = dispatcher
            .parse(Sender::player(), "flagged 5")
            .await
            .expect("flags are optional");
        assert!(!outcome.context.has_flag("verbose"));

        let error = dispatcher
            .parse(Sender::player(), "flagged 5 --nope")
            .await
            .expect_err("unknown flag");
        assert!(matches!(error, DispatchError::ArgumentParse { .. }));
    }

    #[tokio::test]
    async fn test_liberal_flag_parsing_allows_flags_before_arguments() {
        let dispatcher = CommandDispatcher::builder()
            .permission_checker(SenderPermissions)
            .settings(Settings {
                liberal_flag_parsing: true,
                ..Settings::default()
            })
            .build();
        dispatcher
            .register(
                Command::builder("flagged")
                    .required("x", IntegerParser::new())
                    .flag(CommandFlag::builder("verbose").short('v').build())
                    .handler(ok_handler())
                    .build()
                    .expect("command"),
            )
            .expect("register");

        let outcome = dispatcher
            .parse(Sender::player(), "flagged --verbose 5")
            .await
            .expect("flag before the argument");
        assert_eq!(outcome.context.get::<i64>("x"), Some(&5));
        assert_eq!(outcome.context.flag::<bool>("verbose"), Some(&true));

        let outcome = dispatcher
            .parse(Sender::player(), "flagged 5 --verbose")
            .await
            .expect("flag after the argument");
        assert_eq!(outcome.context.flag::<bool>("verbose"), Some(&true));

        // A negative number is not mistaken for a flag.
        let outcome = dispatcher
            .parse(Sender::player(), "flagged -5")
            .await
            .expect("negative value");
        assert_eq!(outcome.context.get::<i64>("x"), Some(&-5));
    }

    #[tokio::test]
    async fn test_boolean_flag_value() {
        let dispatcher = dispatcher();
        dispatcher
            .register(
                Command::builder("toggle")
                    .flag(
                        CommandFlag::builder("state")
                            .value_parser(BooleanParser)
                            .build(),
                    )
                    .handler(ok_handler())
                    .build()
                    .expect("command"),
            )
            .expect("register");

        let outcome = dispatcher
            .parse(Sender::player(), "toggle --state false")
            .await
            .expect("boolean flag value");
        assert_eq!(outcome.context.flag::<bool>("state"), Some(&false));
    }

    #[tokio::test]
    async fn test_handler_failure_surfaces() {
        let dispatcher = dispatcher();
        dispatcher
            .register(
                Command::builder("failing")
                    .handler(handler_fn(|_context| Err("boom".into())))
                    .build()
                    .expect("command"),
            )
            .expect("register");

        let error = dispatcher
            .execute(Sender::player(), "failing")
            .await
            .expect_err("handler error surfaces");
        assert!(matches!(error, DispatchError::Handler(_)));
    }

    #[tokio::test]
    async fn test_parse_is_idempotent_on_fresh_contexts() {
        let dispatcher = dispatcher();
        dispatcher
            .register(
                Command::builder("twice")
                    .required("x", IntegerParser::new())
                    .handler(ok_handler())
                    .build()
                    .expect("command"),
            )
            .expect("register");

        let first = dispatcher
            .parse(Sender::player(), "twice 7")
            .await
            .expect("first run");
        let second = dispatcher
            .parse(Sender::player(), "twice 7")
            .await
            .expect("second run");
        assert_eq!(
            first.context.get::<i64>("x"),
            second.context.get::<i64>("x")
        );
        assert!(Arc::ptr_eq(&first.command, &second.command));
    }
}
