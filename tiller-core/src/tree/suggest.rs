//! The suggestion walk.
//!
//! The parse walk's sibling: the same recursive descent, but it never fails
//! and it collects candidates from every branch that could still claim the
//! token being typed. Denied or unparsable branches contribute nothing.

use std::sync::Arc;

use futures::future::BoxFuture;

use crate::component::{CommandComponent, ComponentKind};
use crate::context::CommandContext;
use crate::dispatcher::CommandDispatcher;
use crate::input::CommandInput;
use crate::parser::flag::FlagParser;
use crate::sender::CommandSender;
use crate::suggestion::Suggestion;
use crate::tree::CommandNode;

impl<S: CommandSender> CommandDispatcher<S> {
    pub(crate) fn suggest_walk<'a>(
        &'a self,
        node: &'a Arc<CommandNode<S>>,
        context: &'a mut CommandContext<S>,
        input: &'a mut CommandInput,
    ) -> BoxFuture<'a, Vec<Suggestion>> {
        Box::pin(async move {
            if !node.is_root() && self.gate(node, context.sender()).is_err() {
                return Vec::new();
            }

            let children = node.children();
            let token = input.peek_string().to_owned();

            // Literal navigation: with more input ahead, an exact match
            // advances instead of contributing candidates.
            if input.remaining_tokens() > 1 {
                let nav = children
                    .iter()
                    .find(|child| {
                        child.accepts_literal(&token)
                            && self.gate(child, context.sender()).is_ok()
                    })
                    .cloned();
                if let Some(child) = nav {
                    input.read_string();
                    return self.suggest_walk(&child, context, input).await;
                }
            }

            let mut out = Vec::new();

            // Literal children complete the token being typed. Exact matches
            // are excluded: they would offer no completion.
            if input.remaining_tokens() <= 1 {
                let token_lower = token.to_lowercase();
                for child in &children {
                    if child.kind() != Some(ComponentKind::Literal)
                        || self.gate(child, context.sender()).is_err()
                    {
                        continue;
                    }
                    let Some(literal) = child.component().and_then(|c| c.literal_parser()) else {
                        continue;
                    };
                    for name in literal.all_names() {
                        if name.to_lowercase().starts_with(&token_lower)
                            && !name.eq_ignore_ascii_case(&token)
                        {
                            out.push(Suggestion::new(name));
                        }
                    }
                }
            }

            for child in &children {
                let Some(component) = child.component().cloned() else {
                    continue;
                };
                if component.kind() == ComponentKind::Literal
                    || self.gate(child, context.sender()).is_err()
                {
                    continue;
                }

                if let Some(flag_parser) = component.flag_parser() {
                    let state = flag_parser.parse_current_flag(input);
                    context.set_flag_state(state);
                }

                let greedy_leaf = child.is_leaf() && component.is_greedy();
                if input.remaining_tokens() <= 1 || greedy_leaf {
                    context.set_current_component(Arc::clone(&component));
                    out.extend(component.suggestions(context, input).await);
                    if component.kind() == ComponentKind::Flag {
                        // A flag node also walks its children, so the next
                        // positional argument is offered alongside the flags.
                        out.extend(self.suggest_walk(child, context, input).await);
                    }
                    continue;
                }

                if component.kind() == ComponentKind::Flag {
                    out.extend(
                        self.suggest_flag_child(child, &component, context, input)
                            .await,
                    );
                    continue;
                }

                if component.preprocess(context, input).await.is_err() {
                    continue;
                }

                let snapshot = input.cursor();
                let started_next_token = input
                    .remaining_input()
                    .ends_with(char::is_whitespace);
                match component.parse(context, input).await {
                    Ok(value) => {
                        if !input.is_empty_ignoring_whitespace() || started_next_token {
                            context.store_erased(component.name().to_owned(), value);
                            out.extend(self.suggest_walk(child, context, input).await);
                        } else {
                            // The cursor sat mid-token: complete the token
                            // from its original position.
                            input.set_cursor(snapshot);
                            context.set_current_component(Arc::clone(&component));
                            out.extend(component.suggestions(context, input).await);
                        }
                    }
                    Err(_) => input.set_cursor(snapshot),
                }
            }

            out
        })
    }

    /// Suggestion handling for a flag node with more than one token left:
    /// consume the complete flags, then either complete the flag construct
    /// being typed or hand over to the positional children.
    async fn suggest_flag_child(
        &self,
        child: &Arc<CommandNode<S>>,
        component: &Arc<CommandComponent<S>>,
        context: &mut CommandContext<S>,
        input: &mut CommandInput,
    ) -> Vec<Suggestion> {
        let Some(flag_parser) = component.flag_parser().cloned() else {
            return Vec::new();
        };

        loop {
            let token = input.peek_string().to_owned();
            let Some(cost) = flag_parser.token_cost(&token) else {
                break;
            };
            if input.remaining_tokens() <= cost {
                // Consuming this flag would eat the token being typed.
                break;
            }
            let snapshot = input.cursor();
            if flag_parser.parse_one(context, input).await.is_err() {
                input.set_cursor(snapshot);
                break;
            }
        }

        context.set_flag_state(flag_parser.parse_current_flag(input));

        let token = input.peek_string().to_owned();
        if input.remaining_tokens() <= 1 {
            context.set_current_component(Arc::clone(component));
            let mut out = component.suggestions(context, input).await;
            out.extend(self.suggest_walk(child, context, input).await);
            out
        } else if FlagParser::<S>::is_flag_token(&token) {
            // Mid-flag: a value is being typed for the flag ahead. Step past
            // the flag token so the value parser sees the partial value.
            let snapshot = input.cursor();
            input.read_string();
            context.set_current_component(Arc::clone(component));
            let out = component.suggestions(context, input).await;
            input.set_cursor(snapshot);
            out
        } else {
            self.suggest_walk(child, context, input).await
        }
    }
}

#[cfg(test)]
mod tests {
    use futures::future::BoxFuture;

    use crate::command::{Command, CommandHandler, handler_fn};
    use crate::component::CommandComponent;
    use crate::context::CommandContext;
    use crate::dispatcher::CommandDispatcher;
    use crate::input::CommandInput;
    use crate::parser::flag::CommandFlag;
    use crate::parser::standard::{
        BooleanParser, ChoiceParser, DurationParser, IntegerParser, StringParser,
    };
    use crate::permission::{Permission, PermissionChecker};
    use crate::sender::{CommandSender, SenderKind};
    use crate::settings::Settings;
    use crate::suggestion::{Suggestion, SuggestionProvider};

    #[derive(Clone)]
    struct Sender {
        permissions: Vec<&'static str>,
    }

    impl Sender {
        fn new() -> Self {
            Self {
                permissions: Vec::new(),
            }
        }

        fn with_permissions(permissions: &[&'static str]) -> Self {
            Self {
                permissions: permissions.to_vec(),
            }
        }
    }

    impl CommandSender for Sender {
        fn kind(&self) -> SenderKind {
            SenderKind::named("player")
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

    async fn texts(dispatcher: &CommandDispatcher<Sender>, sender: Sender, input: &str) -> Vec<String> {
        dispatcher
            .suggestions(sender, input)
            .await
            .into_iter()
            .map(|s| s.text)
            .collect()
    }

    struct FixedSuggestions(Vec<&'static str>);

    impl SuggestionProvider<Sender> for FixedSuggestions {
        fn suggestions<'a>(
            &'a self,
            _context: &'a CommandContext<Sender>,
            _input: &'a CommandInput,
        ) -> BoxFuture<'a, Vec<Suggestion>> {
            Box::pin(async move { self.0.iter().copied().map(Suggestion::new).collect() })
        }
    }

    #[tokio::test]
    async fn test_root_literals_complete_partial_token() {
        let dispatcher = dispatcher();
        dispatcher
            .register(
                Command::builder("test")
                    .handler(ok_handler())
                    .build()
                    .expect("command"),
            )
            .expect("register");
        dispatcher
            .register(
                Command::builder("other")
                    .handler(ok_handler())
                    .build()
                    .expect("command"),
            )
            .expect("register");

        assert_eq!(texts(&dispatcher, Sender::new(), "t").await, vec!["test"]);
        // An exact match offers no completion.
        assert!(texts(&dispatcher, Sender::new(), "test").await.is_empty());
    }

    #[tokio::test]
    async fn test_trailing_space_asks_for_the_next_argument() {
        let dispatcher = dispatcher();
        dispatcher
            .register(
                Command::builder("test")
                    .literal("foo")
                    .handler(ok_handler())
                    .build()
                    .expect("command"),
            )
            .expect("register");
        dispatcher
            .register(
                Command::builder("test")
                    .literal("bar")
                    .handler(ok_handler())
                    .build()
                    .expect("command"),
            )
            .expect("register");

        let mut suggestions = texts(&dispatcher, Sender::new(), "test ").await;
        suggestions.sort();
        assert_eq!(suggestions, vec!["bar", "foo"]);
        // Without the space, "test" itself is being completed, and it is
        // already exact.
        assert!(texts(&dispatcher, Sender::new(), "test").await.is_empty());
    }

    #[tokio::test]
    async fn test_greedy_leaf_suggests_from_original_cursor() {
        let dispatcher = dispatcher();
        dispatcher
            .register(
                Command::builder("greedy")
                    .component(
                        CommandComponent::required("message", StringParser::greedy())
                            .with_suggestion_provider(FixedSuggestions(vec!["hello", "hey"])),
                    )
                    .handler(ok_handler())
                    .build()
                    .expect("command"),
            )
            .expect("register");

        let suggestions = texts(&dispatcher, Sender::new(), "greedy ").await;
        assert_eq!(suggestions, vec!["hello", "hey"]);

        let suggestions = texts(&dispatcher, Sender::new(), "greedy he").await;
        assert_eq!(suggestions, vec!["hello", "hey"]);
    }

    #[tokio::test]
    async fn test_duration_suggestions_through_the_walk() {
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

        let suggestions = texts(&dispatcher, Sender::new(), "duration 1d").await;
        assert_eq!(suggestions, vec!["1d1h", "1d1m", "1d1s"]);
        assert!(!suggestions.contains(&"1d1d".to_owned()));
    }

    #[tokio::test]
    async fn test_completed_argument_hands_over_to_the_next() {
        let dispatcher = dispatcher();
        dispatcher
            .register(
                Command::builder("weather")
                    .required("kind", ChoiceParser::new(["clear", "rain"]))
                    .required("sure", BooleanParser)
                    .handler(ok_handler())
                    .build()
                    .expect("command"),
            )
            .expect("register");

        // Mid-token: complete the first argument.
        assert_eq!(
            texts(&dispatcher, Sender::new(), "weather cl").await,
            vec!["clear"]
        );
        // Token finished, next one started: complete the second argument.
        let mut suggestions = texts(&dispatcher, Sender::new(), "weather clear ").await;
        suggestions.sort();
        assert_eq!(suggestions, vec!["false", "true"]);
        assert_eq!(
            texts(&dispatcher, Sender::new(), "weather clear t").await,
            vec!["true"]
        );
    }

    #[tokio::test]
    async fn test_suggestions_respect_permissions() {
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
            .expect("register");
        dispatcher
            .register(
                Command::builder("test")
                    .literal("bar")
                    .permission(Permission::atom("p2"))
                    .handler(ok_handler())
                    .build()
                    .expect("command"),
            )
            .expect("register");

        // The union at "test" admits a p2 holder.
        assert_eq!(
            texts(&dispatcher, Sender::with_permissions(&["p2"]), "t").await,
            vec!["test"]
        );
        // Below it, only the branch the sender may run is offered.
        assert_eq!(
            texts(&dispatcher, Sender::with_permissions(&["p2"]), "test ").await,
            vec!["bar"]
        );
        // A sender with neither permission sees nothing at all.
        assert!(texts(&dispatcher, Sender::new(), "t").await.is_empty());
    }

    #[tokio::test]
    async fn test_flag_name_and_value_suggestions() {
        let dispatcher = dispatcher();
        dispatcher
            .register(
                Command::builder("run")
                    .required("x", IntegerParser::new())
                    .flag(CommandFlag::builder("verbose").short('v').build())
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

        let suggestions = texts(&dispatcher, Sender::new(), "run 5 --").await;
        assert!(suggestions.contains(&"--verbose".to_owned()));
        assert!(suggestions.contains(&"--state".to_owned()));

        let mut suggestions = texts(&dispatcher, Sender::new(), "run 5 --state ").await;
        suggestions.sort();
        assert_eq!(suggestions, vec!["false", "true"]);

        let suggestions = texts(&dispatcher, Sender::new(), "run 5 --state t").await;
        assert_eq!(suggestions, vec!["true"]);

        // After a complete flag, further flags are still offered.
        let suggestions = texts(&dispatcher, Sender::new(), "run 5 --verbose --").await;
        assert!(suggestions.contains(&"--state".to_owned()));
    }

    #[tokio::test]
    async fn test_liberal_flags_are_offered_alongside_positionals() {
        let dispatcher = CommandDispatcher::builder()
            .permission_checker(SenderPermissions)
            .settings(Settings {
                liberal_flag_parsing: true,
                ..Settings::default()
            })
            .build();
        dispatcher
            .register(
                Command::builder("run")
                    .required("kind", ChoiceParser::new(["fast", "slow"]))
                    .flag(CommandFlag::builder("verbose").build())
                    .handler(ok_handler())
                    .build()
                    .expect("command"),
            )
            .expect("register");

        let suggestions = texts(&dispatcher, Sender::new(), "run ").await;
        assert!(suggestions.contains(&"--verbose".to_owned()));
        assert!(suggestions.contains(&"fast".to_owned()));
        assert!(suggestions.contains(&"slow".to_owned()));
    }

    #[tokio::test]
    async fn test_force_suggestion_emits_one_empty_candidate() {
        let dispatcher = CommandDispatcher::builder()
            .permission_checker(SenderPermissions)
            .settings(Settings {
                force_suggestion: true,
                ..Settings::default()
            })
            .build();

        let suggestions = dispatcher.suggestions(Sender::new(), "nothing here").await;
        assert_eq!(suggestions, vec![Suggestion::new("")]);
    }

    #[tokio::test]
    async fn test_literal_navigation_consumes_exact_tokens() {
        let dispatcher = dispatcher();
        dispatcher
            .register(
                Command::builder("outer")
                    .literal("inner")
                    .required("kind", ChoiceParser::new(["alpha", "beta"]))
                    .handler(ok_handler())
                    .build()
                    .expect("command"),
            )
            .expect("register");

        assert_eq!(
            texts(&dispatcher, Sender::new(), "outer inner a").await,
            vec!["alpha"]
        );
        assert_eq!(
            texts(&dispatcher, Sender::new(), "outer inn").await,
            vec!["inner"]
        );
    }

    #[tokio::test]
    async fn test_unknown_prefix_suggests_nothing() {
        let dispatcher = dispatcher();
        dispatcher
            .register(
                Command::builder("known")
                    .handler(ok_handler())
                    .build()
                    .expect("command"),
            )
            .expect("register");

        assert!(texts(&dispatcher, Sender::new(), "zzz zz").await.is_empty());
    }
}
