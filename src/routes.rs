use crate::{
    api::{advance, chat, fine, main_category, payroll, remark, subcategory, user, work_log},
    auth::middleware::auth_middleware,
    chat::ws,
    config::Config,
};
use actix_governor::{
    Governor, GovernorConfigBuilder, PeerIpKeyExtractor, governor::middleware::NoOpMiddleware,
};
use actix_web::{middleware::from_fn, web};
use std::sync::Arc;

pub fn configure(cfg: &mut web::ServiceConfig, config: Config) {
    // Helper to build per-route limiter
    fn build_limiter(requests_per_min: u32) -> Governor<PeerIpKeyExtractor, NoOpMiddleware> {
        let per_ms = if requests_per_min == 0 {
            1
        } else {
            60_000 / requests_per_min as u64
        };
        let cfg = GovernorConfigBuilder::default()
            .per_millisecond(per_ms)
            .burst_size(requests_per_min)
            .key_extractor(PeerIpKeyExtractor)
            .finish()
            .unwrap();
        Governor::new(&cfg)
    }

    let login_limiter = Arc::new(build_limiter(config.rate_login_per_min));
    let register_limiter = Arc::new(build_limiter(config.rate_register_per_min));
    let protected_limiter = Arc::new(build_limiter(config.rate_protected_per_min));

    cfg.service(
        web::scope(&config.api_prefix)
            .service(
                web::scope("/users")
                    // Public: registration and login sit in front of the
                    // auth wall, each behind its own limiter.
                    .service(
                        web::resource("/register")
                            .wrap(register_limiter.clone())
                            .route(web::post().to(user::register)),
                    )
                    .service(
                        web::resource("/login")
                            .wrap(login_limiter.clone())
                            .route(web::post().to(user::login)),
                    )
                    .service(
                        web::scope("")
                            .wrap(from_fn(auth_middleware))
                            .wrap(protected_limiter.clone())
                            // literal segments before {user_id}, or the
                            // parameter route swallows them
                            .service(
                                web::resource("/profile")
                                    .route(web::get().to(user::get_profile))
                                    .route(web::put().to(user::update_profile)),
                            )
                            .service(
                                web::resource("/change-password")
                                    .route(web::put().to(user::change_password)),
                            )
                            .service(
                                web::resource("/pending")
                                    .route(web::get().to(user::pending_users)),
                            )
                            .service(
                                web::resource("/chat-list")
                                    .route(web::get().to(user::chat_list)),
                            )
                            .service(
                                web::resource("/all")
                                    .route(web::get().to(user::list_all_users)),
                            )
                            .service(web::resource("").route(web::get().to(user::list_employees)))
                            .service(
                                web::resource("/{user_id}/approve")
                                    .route(web::put().to(user::approve_user)),
                            )
                            .service(
                                web::resource("/{user_id}/decline")
                                    .route(web::put().to(user::decline_user)),
                            )
                            .service(
                                web::resource("/{user_id}/remarks")
                                    .route(web::get().to(remark::list_remarks))
                                    .route(web::post().to(remark::create_remark)),
                            )
                            .service(
                                web::resource("/{user_id}")
                                    .route(web::get().to(user::get_employee))
                                    .route(web::delete().to(user::delete_employee)),
                            ),
                    ),
            )
            .service(
                web::scope("/main-categories")
                    .wrap(from_fn(auth_middleware))
                    .wrap(protected_limiter.clone())
                    .service(
                        web::resource("")
                            .route(web::get().to(main_category::list_main_categories))
                            .route(web::post().to(main_category::create_main_category)),
                    )
                    .service(
                        web::resource("/{category_id}")
                            .route(web::delete().to(main_category::delete_main_category)),
                    ),
            )
            .service(
                web::scope("/subcategories")
                    .wrap(from_fn(auth_middleware))
                    .wrap(protected_limiter.clone())
                    .service(
                        web::resource("")
                            .route(web::get().to(subcategory::list_subcategories))
                            .route(web::post().to(subcategory::create_subcategory)),
                    )
                    .service(
                        web::resource("/reorder")
                            .route(web::post().to(subcategory::reorder_subcategories)),
                    )
                    .service(
                        web::resource("/{subcategory_id}")
                            .route(web::put().to(subcategory::update_subcategory))
                            .route(web::delete().to(subcategory::delete_subcategory)),
                    ),
            )
            .service(
                web::scope("/worklogs")
                    .wrap(from_fn(auth_middleware))
                    .wrap(protected_limiter.clone())
                    .service(
                        web::resource("")
                            .route(web::post().to(work_log::create_work_log)),
                    )
                    .service(
                        web::resource("/delivery")
                            .route(web::post().to(work_log::create_delivery_log)),
                    )
                    .service(
                        web::resource("/all")
                            .route(web::get().to(work_log::list_all_work_logs)),
                    )
                    .service(
                        web::resource("/my-logs")
                            .route(web::get().to(work_log::my_work_logs)),
                    )
                    .service(
                        web::resource("/current-salary")
                            .route(web::get().to(work_log::current_salary)),
                    )
                    .service(
                        web::resource("/{log_id}")
                            .route(web::put().to(work_log::update_work_log))
                            .route(web::delete().to(work_log::delete_work_log)),
                    ),
            )
            .service(
                web::scope("/payroll")
                    .wrap(from_fn(auth_middleware))
                    .wrap(protected_limiter.clone())
                    .service(
                        web::resource("/current-period-summary")
                            .route(web::get().to(payroll::current_period_summary)),
                    )
                    .service(
                        web::resource("/employee-summary/{employee_id}")
                            .route(web::get().to(payroll::employee_summary)),
                    )
                    .service(
                        web::resource("/generate")
                            .route(web::post().to(payroll::generate_payroll)),
                    )
                    .service(
                        web::resource("/history/{employee_id}")
                            .route(web::get().to(payroll::payroll_history)),
                    ),
            )
            .service(
                web::scope("/advances")
                    .wrap(from_fn(auth_middleware))
                    .wrap(protected_limiter.clone())
                    .service(
                        web::resource("")
                            .route(web::post().to(advance::create_advance)),
                    )
                    .service(
                        web::resource("/summary")
                            .route(web::get().to(advance::advance_summary)),
                    )
                    .service(
                        web::resource("/employee/{employee_id}")
                            .route(web::get().to(advance::employee_advances)),
                    )
                    .service(
                        web::resource("/{advance_id}/settle")
                            .route(web::put().to(advance::settle_advance)),
                    )
                    .service(
                        web::resource("/{advance_id}/settlements/{settlement_id}")
                            .route(web::put().to(advance::update_settlement))
                            .route(web::delete().to(advance::delete_settlement)),
                    )
                    .service(
                        web::resource("/{advance_id}")
                            .route(web::get().to(advance::get_advance))
                            .route(web::put().to(advance::update_advance))
                            .route(web::delete().to(advance::delete_advance)),
                    ),
            )
            .service(
                web::scope("/fines")
                    .wrap(from_fn(auth_middleware))
                    .wrap(protected_limiter.clone())
                    .service(web::resource("").route(web::post().to(fine::create_fine)))
                    .service(
                        web::resource("/summary").route(web::get().to(fine::fine_summary)),
                    )
                    .service(
                        web::resource("/employee/{employee_id}")
                            .route(web::get().to(fine::employee_fines)),
                    )
                    .service(
                        web::resource("/{fine_id}")
                            .route(web::put().to(fine::update_fine))
                            .route(web::delete().to(fine::delete_fine)),
                    ),
            )
            .service(
                web::scope("/remarks")
                    .wrap(from_fn(auth_middleware))
                    .wrap(protected_limiter.clone())
                    .service(
                        web::resource("/{remark_id}")
                            .route(web::put().to(remark::update_remark))
                            .route(web::delete().to(remark::delete_remark)),
                    ),
            )
            .service(
                web::scope("/chat")
                    .wrap(from_fn(auth_middleware))
                    .wrap(protected_limiter.clone())
                    .service(
                        web::resource("")
                            .route(web::get().to(chat::list_conversations))
                            .route(web::post().to(chat::create_dm)),
                    )
                    .service(
                        web::resource("/messages/{conversation_id}")
                            .route(web::get().to(chat::get_messages)),
                    )
                    .service(
                        web::resource("/group/{conversation_id}")
                            .route(web::put().to(chat::update_group)),
                    )
                    .service(web::resource("/group").route(web::post().to(chat::create_group)))
                    .service(web::resource("/groupadd").route(web::put().to(chat::group_add)))
                    .service(
                        web::resource("/groupremove").route(web::put().to(chat::group_remove)),
                    )
                    .service(
                        web::resource("/note/join").route(web::put().to(chat::join_note)),
                    )
                    .service(
                        web::resource("/read/{conversation_id}")
                            .route(web::post().to(chat::mark_read)),
                    )
                    .service(
                        web::resource("/recall/{message_id}")
                            .route(web::put().to(chat::recall_message)),
                    )
                    .service(
                        web::resource("/message/{message_id}")
                            .route(web::delete().to(chat::delete_message)),
                    ),
            ),
    );

    // The socket handshake authenticates itself with a token query param,
    // so it lives outside the bearer-header middleware.
    cfg.service(web::resource("/ws").route(web::get().to(ws::ws_entry)));
}
